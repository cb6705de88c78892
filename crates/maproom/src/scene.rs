//! Scene delivery boundary
//!
//! The persistence layer never owns drawables. Loading a map into a scene
//! hands each proxy to an opaque [`SceneSink`] according to its render mode;
//! what a "scene" is and how actors are drawn lives entirely on the other
//! side of the trait.

use maproom_core::{ActorProxy, Map, RenderMode};

/// Receiver for the proxies of a map being loaded into a scene
///
/// When the map carries an environment actor, that proxy is delivered first
/// through [`add_actor`](SceneSink::add_actor) and every other actor-rendered
/// proxy arrives as one of its children; billboards always go directly to the
/// scene.
pub trait SceneSink {
    /// A proxy rendered as an actor, attached directly to the scene
    fn add_actor(&mut self, proxy: &ActorProxy);
    /// A proxy rendered as a billboard, attached directly to the scene
    fn add_billboard(&mut self, proxy: &ActorProxy);
    /// A proxy rendered as an actor, attached under the environment actor
    fn add_environment_child(&mut self, environment: &ActorProxy, child: &ActorProxy);
}

/// Deliver every proxy of `map` to `sink`, honoring per-proxy render modes
///
/// `RenderMode::Auto` is rendered as an actor at this layer; editors that
/// want a different treatment decide before calling.
pub(crate) fn deliver_map(map: &Map, sink: &mut dyn SceneSink, include_billboards: bool) {
    let environment = map.environment_actor().and_then(|id| map.proxy(id));
    if let Some(env) = environment {
        sink.add_actor(env);
    }
    for proxy in map.proxies() {
        if Some(proxy.id) == map.environment_actor() {
            continue;
        }
        match proxy.render_mode {
            RenderMode::Actor | RenderMode::Auto => deliver_actor(sink, environment, proxy),
            RenderMode::Billboard => {
                if include_billboards {
                    sink.add_billboard(proxy);
                }
            }
            RenderMode::ActorAndBillboard => {
                deliver_actor(sink, environment, proxy);
                if include_billboards {
                    sink.add_billboard(proxy);
                }
            }
        }
    }
}

fn deliver_actor(sink: &mut dyn SceneSink, environment: Option<&ActorProxy>, proxy: &ActorProxy) {
    match environment {
        Some(env) => sink.add_environment_child(env, proxy),
        None => sink.add_actor(proxy),
    }
}
