//! Static route table.
//!
//! [`RouteTable`] maps a lookup key `"<topic>:<event>"` to the URL of the
//! handler that processes it. The table is built once from configuration
//! and never changes afterwards; the consumer loop holds it behind an `Arc`.
//!
//! Topics are namespaced per application: a route for topic `stat` in
//! application `PoESocial` answers for the broker topic `PoESocial_stat`.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{RouterError, RouterResult};

/// The only event kind produced by the consumer loop today.
pub const UPDATE_EVENT: &str = "UPDATE";

fn default_event() -> String {
    UPDATE_EVENT.to_string()
}

/// One configured route, relative to its application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteSpec {
    /// Topic name without the application prefix.
    pub topic: String,
    /// Event kind, `UPDATE` unless stated.
    #[serde(default = "default_event")]
    pub event: String,
    /// Handler path relative to the delegator, or an absolute URL.
    pub handler: String,
}

impl RouteSpec {
    /// Creates an `UPDATE` route.
    #[must_use]
    pub fn update(topic: impl Into<String>, handler: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            event: default_event(),
            handler: handler.into(),
        }
    }
}

/// Broker topic for `topic` inside application `app`.
#[must_use]
pub fn app_topic(app: &str, topic: &str) -> String {
    format!("{app}_{topic}")
}

/// Resolves a handler against the delegator base URL.
///
/// Absolute `http://` / `https://` handlers are returned unchanged.
#[must_use]
pub fn resolve_handler(delegator_url: &str, handler: &str) -> String {
    if handler.starts_with("http://") || handler.starts_with("https://") {
        return handler.to_string();
    }
    format!(
        "{}/{}",
        delegator_url.trim_end_matches('/'),
        handler.trim_start_matches('/')
    )
}

/// Immutable `(topic, event) → handler URL` mapping.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: HashMap<String, String>,
    applications: Vec<String>,
}

impl RouteTable {
    /// Builds the table from per-application route lists.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::Route`] for an empty application name, topic,
    /// event or handler, and when two routes resolve to the same key.
    pub fn build(
        apps: &BTreeMap<String, Vec<RouteSpec>>,
        delegator_url: &str,
    ) -> RouterResult<Self> {
        let mut routes = HashMap::new();
        let mut applications = Vec::with_capacity(apps.len());

        for (app, specs) in apps {
            if app.is_empty() {
                return Err(RouterError::Route("application name is empty".into()));
            }
            applications.push(app.clone());

            for spec in specs {
                if spec.topic.is_empty() || spec.event.is_empty() || spec.handler.is_empty() {
                    return Err(RouterError::Route(format!(
                        "incomplete route in application '{app}': {spec:?}"
                    )));
                }
                let key = Self::route_key(&app_topic(app, &spec.topic), &spec.event);
                let url = resolve_handler(delegator_url, &spec.handler);
                if routes.insert(key.clone(), url).is_some() {
                    return Err(RouterError::Route(format!("duplicate route '{key}'")));
                }
            }
        }

        Ok(Self {
            routes,
            applications,
        })
    }

    /// Builds the lookup key for a topic and event kind.
    #[must_use]
    pub fn route_key(topic: &str, event: &str) -> String {
        format!("{topic}:{event}")
    }

    /// Looks up a handler URL by key.
    #[must_use]
    pub fn lookup(&self, key: &str) -> Option<&str> {
        self.routes.get(key).map(String::as_str)
    }

    /// Looks up the handler URL for a broker topic and event kind.
    #[must_use]
    pub fn route_for(&self, topic: &str, event: &str) -> Option<&str> {
        self.lookup(&Self::route_key(topic, event))
    }

    /// Number of routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns `true` if no routes are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Application names, in configuration order.
    #[must_use]
    pub fn applications(&self) -> &[String] {
        &self.applications
    }

    /// Regex subscriptions covering every application's topics.
    #[must_use]
    pub fn subscription_patterns(&self) -> Vec<String> {
        self.applications
            .iter()
            .map(|app| format!("^{app}_.*"))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apps(entries: &[(&str, Vec<RouteSpec>)]) -> BTreeMap<String, Vec<RouteSpec>> {
        entries
            .iter()
            .map(|(app, routes)| ((*app).to_string(), routes.clone()))
            .collect()
    }

    #[test]
    fn test_lookup_by_key() {
        let table = RouteTable::build(
            &apps(&[("PoESocial", vec![RouteSpec::update("stat", "get_stashes")])]),
            "http://localhost:8080",
        )
        .unwrap();

        assert_eq!(
            table.lookup("PoESocial_stat:UPDATE"),
            Some("http://localhost:8080/get_stashes")
        );
        assert_eq!(table.lookup("PoESocial_stat:DELETE"), None);
        assert_eq!(table.lookup("stat:UPDATE"), None);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_multiple_applications() {
        let table = RouteTable::build(
            &apps(&[
                ("PoESocial", vec![RouteSpec::update("stat", "get_stashes")]),
                ("Ledger", vec![RouteSpec::update("stat", "http://ledger:9000/post")]),
            ]),
            "http://localhost:8080",
        )
        .unwrap();

        assert_eq!(
            table.route_for("Ledger_stat", UPDATE_EVENT),
            Some("http://ledger:9000/post")
        );
        assert_eq!(
            table.route_for("PoESocial_stat", UPDATE_EVENT),
            Some("http://localhost:8080/get_stashes")
        );
        assert_eq!(
            table.subscription_patterns(),
            vec!["^Ledger_.*".to_string(), "^PoESocial_.*".to_string()]
        );
    }

    #[test]
    fn test_resolve_handler_slashes() {
        assert_eq!(
            resolve_handler("http://localhost:8080/", "/get_stashes"),
            "http://localhost:8080/get_stashes"
        );
        assert_eq!(
            resolve_handler("http://localhost:8080", "https://other/fn"),
            "https://other/fn"
        );
    }

    #[test]
    fn test_duplicate_route_rejected() {
        let err = RouteTable::build(
            &apps(&[(
                "PoESocial",
                vec![
                    RouteSpec::update("stat", "a"),
                    RouteSpec::update("stat", "b"),
                ],
            )]),
            "http://localhost:8080",
        )
        .unwrap_err();
        assert!(err.to_string().contains("PoESocial_stat:UPDATE"));
    }

    #[test]
    fn test_empty_topic_rejected() {
        let result = RouteTable::build(
            &apps(&[("PoESocial", vec![RouteSpec::update("", "a")])]),
            "http://localhost:8080",
        );
        assert!(matches!(result, Err(RouterError::Route(_))));
    }

    #[test]
    fn test_application_without_routes_still_subscribes() {
        let table =
            RouteTable::build(&apps(&[("PoESocial", vec![])]), "http://localhost:8080").unwrap();
        assert!(table.is_empty());
        assert_eq!(table.subscription_patterns(), vec!["^PoESocial_.*".to_string()]);
    }

    #[test]
    fn test_event_defaults_to_update() {
        let spec: RouteSpec =
            serde_json::from_str(r#"{"topic":"stat","handler":"get_stashes"}"#).unwrap();
        assert_eq!(spec.event, UPDATE_EVENT);
    }
}
