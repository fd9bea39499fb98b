//! LocalStorage persistence and configuration.

use fourstuck_core::ClientConfig;
use fourstuck_core::config::Endpoints;
use fourstuck_core::persist::KeyValueStore;
use gloo::storage::{LocalStorage, Storage};

/// Optional JSON override of [`ClientConfig`].
const CONFIG_OVERRIDE_KEY: &str = "fourstuck-config";

/// Plain string LocalStorage, as the session keys are read by other tools.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalStore;

impl KeyValueStore for LocalStore {
    fn get(&self, key: &str) -> Option<String> {
        LocalStorage::raw().get_item(key).ok().flatten()
    }

    fn set(&self, key: &str, value: &str) -> bool {
        match LocalStorage::raw().set_item(key, value) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(%key, ?err, "storing value failed");
                false
            }
        }
    }

    fn remove(&self, key: &str) {
        if let Err(err) = LocalStorage::raw().remove_item(key) {
            tracing::warn!(%key, ?err, "removing stored value failed");
        }
    }
}

/// Endpoints for a page served by the game server itself.
///
/// Local development hosts keep the defaults since the dev server and the
/// API run on different ports.
pub fn endpoints_for_origin(origin: &str) -> Option<Endpoints> {
    let (scheme, host) = origin.split_once("://")?;
    let hostname = host.split(':').next().unwrap_or(host);
    if matches!(hostname, "localhost" | "127.0.0.1" | "") {
        return None;
    }
    let ws_scheme = match scheme {
        "https" => "wss",
        "http" => "ws",
        _ => return None,
    };
    Some(Endpoints {
        ws_base: format!("{ws_scheme}://{host}"),
        api_base: format!("{scheme}://{host}"),
    })
}

/// Defaults, then origin-derived endpoints, then the stored override.
/// Endpoints from the origin survive an override that doesn't name them.
pub fn load_config(store: &dyn KeyValueStore, origin: Option<&str>) -> ClientConfig {
    let mut config = ClientConfig::default();
    if let Some(endpoints) = origin.and_then(endpoints_for_origin) {
        config.endpoints = endpoints;
    }
    let Some(json) = store.get(CONFIG_OVERRIDE_KEY) else {
        return config;
    };
    match ClientConfig::from_json(&json) {
        Ok(mut custom) => {
            let names_endpoints = serde_json::from_str::<serde_json::Value>(&json)
                .is_ok_and(|v| v.get("endpoints").is_some());
            if !names_endpoints {
                custom.endpoints = config.endpoints;
            }
            custom
        }
        Err(err) => {
            tracing::warn!("ignoring stored config override: {err}");
            config
        }
    }
}

pub fn page_origin() -> Option<String> {
    web_sys::window()?.location().origin().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fourstuck_core::persist::MemoryStore;

    #[test]
    fn test_endpoints_for_origin() {
        assert_eq!(endpoints_for_origin("http://localhost:5173"), None);
        let secure = endpoints_for_origin("https://play.4stuck.app").unwrap();
        assert_eq!(secure.ws_base, "wss://play.4stuck.app");
        assert_eq!(secure.api_base, "https://play.4stuck.app");
        let plain = endpoints_for_origin("http://10.0.0.5:8000").unwrap();
        assert_eq!(plain.game_socket_url(3), "ws://10.0.0.5:8000/ws/game/3");
        assert_eq!(endpoints_for_origin("file:///index.html"), None);
    }

    #[test]
    fn test_override_wins_and_bad_override_ignored() {
        let store = MemoryStore::new();
        store.set(CONFIG_OVERRIDE_KEY, r#"{"reconnect": {"max_attempts": 2}}"#);
        let config = load_config(&store, Some("https://play.4stuck.app"));
        assert_eq!(config.reconnect.max_attempts, 2);
        assert_eq!(config.endpoints.api_base, "https://play.4stuck.app");

        store.set(CONFIG_OVERRIDE_KEY, r#"{"endpoints": {"api_base": "http://api:9000"}}"#);
        let config = load_config(&store, Some("https://play.4stuck.app"));
        assert_eq!(config.endpoints.api_base, "http://api:9000");
        assert_eq!(config.endpoints.ws_base, Endpoints::default().ws_base);

        store.set(CONFIG_OVERRIDE_KEY, "{not json");
        let config = load_config(&store, Some("https://play.4stuck.app"));
        assert_eq!(config.endpoints.ws_base, "wss://play.4stuck.app");
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod browser_tests {
    use super::*;
    use wasm_bindgen_test::{wasm_bindgen_test, wasm_bindgen_test_configure};

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn test_local_store_remove() {
        let store = LocalStore;
        assert!(store.set("fourstuck-test-key", "7"));
        assert_eq!(store.get("fourstuck-test-key").as_deref(), Some("7"));

        store.remove("fourstuck-test-key");
        assert_eq!(store.get("fourstuck-test-key"), None);
        store.remove("fourstuck-test-key");
    }
}
