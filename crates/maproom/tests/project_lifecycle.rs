//! End-to-end project lifecycle coverage
//!
//! Everything here drives the public API the way an editor shell would:
//! explicit `Project` values, no reaching into internals. Project operations
//! briefly change the process working directory, so the tests in this binary
//! serialize on a file-local lock.

use std::fs;
use std::sync::{Mutex, MutexGuard, OnceLock};

use maproom::{
    ActorProxy, ActorRegistry, ActorType, DataType, Project, ProjectError, RenderMode, SceneSink,
};
use tempfile::TempDir;

fn cwd_lock() -> MutexGuard<'static, ()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Default)]
struct RecordingSink {
    actors: Vec<String>,
    billboards: Vec<String>,
    children: Vec<(String, String)>,
}

impl SceneSink for RecordingSink {
    fn add_actor(&mut self, proxy: &ActorProxy) {
        self.actors.push(proxy.name.clone());
    }

    fn add_billboard(&mut self, proxy: &ActorProxy) {
        self.billboards.push(proxy.name.clone());
    }

    fn add_environment_child(&mut self, environment: &ActorProxy, child: &ActorProxy) {
        self.children
            .push((environment.name.clone(), child.name.clone()));
    }
}

#[test]
fn editing_session_survives_a_process_restart() {
    let _cwd = cwd_lock();
    let dir = TempDir::new().unwrap();

    // Session one: build the project and leave a backup behind.
    Project::create_context(dir.path()).unwrap();
    {
        let mut project = Project::new();
        project.set_context(dir.path(), false).unwrap();
        assert!(project.map_names().unwrap().is_empty());

        project.create_map("Harbor", "harbor").unwrap();
        assert!(dir.path().join("maps/harbor.map").is_file());

        project
            .get_map_mut("Harbor")
            .unwrap()
            .set_description("work in progress");
        project.save_map_backup("Harbor").unwrap();
        // The primary file still holds the last saved state.
        let header = project.get_map_header("Harbor").unwrap();
        assert_eq!(header.description, "");
    }
    // Dropping the project without closing stands in for a crash; the
    // backup stays on disk.
    assert!(dir.path().join("maps/backups/harbor.map.backup").is_file());

    // Session two: recover from the backup and save it for real.
    let mut project = Project::new();
    project.set_context(dir.path(), false).unwrap();
    assert_eq!(project.map_names().unwrap(), ["Harbor"]);
    assert!(project.has_backup("Harbor").unwrap());

    let restored = project.open_map_backup("Harbor").unwrap();
    assert_eq!(restored.description(), "work in progress");
    assert!(restored.is_modified());

    project.save_map("Harbor").unwrap();
    assert!(!project.has_backup("Harbor").unwrap());
    assert!(!dir.path().join("maps/backups/harbor.map.backup").exists());
    let header = project.get_map_header("Harbor").unwrap();
    assert_eq!(header.description, "work in progress");
}

#[test]
fn context_validation_rejects_unusable_directories() {
    let _cwd = cwd_lock();
    let mut project = Project::new();

    // Missing path.
    let dir = TempDir::new().unwrap();
    let err = project
        .set_context(dir.path().join("absent"), false)
        .unwrap_err();
    assert!(matches!(err, ProjectError::ContextInvalid(_)));

    // Empty directory.
    let err = project.set_context(dir.path(), false).unwrap_err();
    assert!(matches!(err, ProjectError::ContextInvalid(_)));

    // Populated directory without a maps subdirectory.
    fs::write(dir.path().join("readme.txt"), "not a project").unwrap();
    let err = project.set_context(dir.path(), false).unwrap_err();
    assert!(matches!(err, ProjectError::ContextInvalid(_)));

    // A regular file as the context path.
    let err = project
        .set_context(dir.path().join("readme.txt"), false)
        .unwrap_err();
    assert!(matches!(err, ProjectError::ContextInvalid(_)));

    assert!(!project.is_valid());

    // Repairing the directory makes it acceptable.
    Project::create_context(dir.path()).unwrap();
    project.set_context(dir.path(), false).unwrap();
    assert!(project.is_valid());
    assert_eq!(
        project.context_name().as_deref(),
        dir.path().file_name().and_then(|n| n.to_str())
    );
}

#[test]
fn name_collisions_leave_no_trace_on_disk() {
    let _cwd = cwd_lock();
    let dir = TempDir::new().unwrap();
    Project::create_context(dir.path()).unwrap();
    let mut project = Project::new();
    project.set_context(dir.path(), false).unwrap();
    project.create_map("Town", "town").unwrap();

    let err = project.create_map("Town", "village").unwrap_err();
    assert!(matches!(err, ProjectError::NameCollision(_)));
    let err = project.create_map("Village", "TOWN").unwrap_err();
    assert!(matches!(err, ProjectError::NameCollision(_)));

    let entries: Vec<String> = fs::read_dir(dir.path().join("maps"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(entries, ["town.map"]);
    assert_eq!(project.map_names().unwrap(), ["Town"]);
}

#[test]
fn working_directory_is_restored_around_operations() {
    let _cwd = cwd_lock();
    let before = std::env::current_dir().unwrap();

    // Failing validation restores the directory.
    let empty = TempDir::new().unwrap();
    let mut project = Project::new();
    assert!(project.set_context(empty.path(), false).is_err());
    assert_eq!(std::env::current_dir().unwrap(), before);

    let dir = TempDir::new().unwrap();
    Project::create_context(dir.path()).unwrap();
    assert_eq!(std::env::current_dir().unwrap(), before);

    project.set_context(dir.path(), false).unwrap();
    assert_eq!(std::env::current_dir().unwrap(), before);

    project.create_map("Town", "town").unwrap();
    assert_eq!(std::env::current_dir().unwrap(), before);

    project.get_map_mut("Town").unwrap().set_author("someone");
    project.save_map("Town").unwrap();
    assert_eq!(std::env::current_dir().unwrap(), before);

    project.index_resources().unwrap();
    assert_eq!(std::env::current_dir().unwrap(), before);

    assert!(project.get_map("Missing").is_err());
    assert_eq!(std::env::current_dir().unwrap(), before);

    project.delete_map("Town", false).unwrap();
    assert_eq!(std::env::current_dir().unwrap(), before);
}

#[test]
fn read_only_projects_share_a_context_with_writers() {
    let _cwd = cwd_lock();
    let dir = TempDir::new().unwrap();
    Project::create_context(dir.path()).unwrap();

    let mut writer = Project::new();
    writer.set_context(dir.path(), false).unwrap();
    writer.create_map("Town", "town").unwrap();

    let mut reader = Project::new();
    reader.set_context(dir.path(), true).unwrap();
    assert!(reader.is_read_only());
    assert_eq!(reader.map_names().unwrap(), ["Town"]);
    assert_eq!(reader.get_map("Town").unwrap().name(), "Town");
    assert!(matches!(
        reader.create_map("Other", "other").unwrap_err(),
        ProjectError::ReadOnly(_)
    ));

    // Changes made by the writer become visible after a refresh.
    writer.create_map("Village", "village").unwrap();
    reader.refresh().unwrap();
    assert_eq!(reader.map_names().unwrap(), ["Town", "Village"]);
}

#[test]
fn loaded_map_reaches_the_scene_through_the_sink() {
    let _cwd = cwd_lock();
    let dir = TempDir::new().unwrap();
    Project::create_context(dir.path()).unwrap();
    let mut project = Project::new();
    project.set_context(dir.path(), false).unwrap();

    let sky_type = ActorType::new("environment", "Sky");
    let tank_type = ActorType::new("vehicles", "Tank");
    project.libraries_mut().register(
        ActorRegistry::new("game_actors", "1.0")
            .with_type(sky_type.clone())
            .with_type(tank_type.clone()),
    );

    project.create_map("Range", "range").unwrap();
    {
        let map = project.get_map_mut("Range").unwrap();
        map.add_library("game_actors", "1.0");

        let sky = ActorProxy::new("sky", sky_type);
        let sky_id = sky.id;
        map.add_proxy(sky);
        map.set_environment_actor(Some(sky_id));

        map.add_proxy(ActorProxy::new("tank", tank_type.clone()));

        let mut marker = ActorProxy::new("marker", tank_type.clone());
        marker.render_mode = RenderMode::Billboard;
        map.add_proxy(marker);

        let mut beacon = ActorProxy::new("beacon", tank_type);
        beacon.render_mode = RenderMode::ActorAndBillboard;
        map.add_proxy(beacon);
    }
    project.save_map("Range").unwrap();
    project.close_map("Range", false).unwrap();

    // Reloaded from disk and delivered with billboards included.
    let mut sink = RecordingSink::default();
    project.load_map_into_scene("Range", &mut sink, true).unwrap();
    assert_eq!(sink.actors, ["sky"]);
    assert_eq!(
        sink.children,
        [
            ("sky".to_string(), "tank".to_string()),
            ("sky".to_string(), "beacon".to_string())
        ]
    );
    assert_eq!(sink.billboards, ["marker", "beacon"]);

    // Same map again with billboards excluded.
    let mut sink = RecordingSink::default();
    project.load_map_into_scene("Range", &mut sink, false).unwrap();
    assert_eq!(sink.actors, ["sky"]);
    assert!(sink.billboards.is_empty());
}

#[test]
fn resources_round_trip_through_the_catalog() {
    let _cwd = cwd_lock();
    let source_dir = TempDir::new().unwrap();
    let source = source_dir.path().join("grass_diffuse.png");
    fs::write(&source, b"pixels").unwrap();

    let dir = TempDir::new().unwrap();
    Project::create_context(dir.path()).unwrap();
    let mut project = Project::new();
    project.set_context(dir.path(), false).unwrap();

    let descriptor = project
        .add_resource("grass", "terrain", &source, DataType::Texture)
        .unwrap();
    assert_eq!(descriptor.identifier, "Textures:terrain:grass.png");
    let stored = project.resource_path(&descriptor).unwrap();
    assert_eq!(fs::read(stored).unwrap(), b"pixels");

    // A second project over the same directory sees the resource through
    // a fresh index.
    let mut other = Project::new();
    other.set_context(dir.path(), false).unwrap();
    let root = other.resources_of_type(DataType::Texture).unwrap();
    let found = root
        .category("terrain")
        .and_then(|terrain| terrain.resource("grass.png"))
        .unwrap();
    assert_eq!(found.identifier, descriptor.identifier);

    other.remove_resource(&descriptor).unwrap();
    assert!(matches!(
        other.resource_path(&descriptor).unwrap_err(),
        ProjectError::FileNotFound(_)
    ));
}
