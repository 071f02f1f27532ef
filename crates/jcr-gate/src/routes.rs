use std::collections::BTreeMap;

/// Built-in page -> permission table.
const DEFAULT_ROUTES: &[(&str, &str)] = &[
    ("/admin/bar", "bar.manage"),
    ("/admin/bar/live", "bar.manage"),
    ("/admin/toastie", "toastie.manage"),
    ("/admin/toastie/live", "toastie.manage"),
    ("/admin/events", "events.manage"),
    ("/admin/events/tickets", "events.manage"),
    ("/admin/elections", "elections.manage"),
    ("/admin/careers", "careers.manage"),
    ("/admin/complaints", "complaints.manage"),
    ("/admin/welfare", "welfare.manage"),
    ("/admin/stash", "stash.manage"),
    ("/admin/stash/export", "stash.export"),
];

/// Declarative route -> required permission map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutePermissions {
    map: BTreeMap<String, String>,
}

impl RoutePermissions {
    /// Empty table: every route is denied.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in admin page table.
    pub fn with_defaults() -> Self {
        let mut t = Self::empty();
        for (route, permission) in DEFAULT_ROUTES {
            t.insert(route, permission);
        }
        t
    }

    /// Built-in table with `overrides` applied on top (later wins).
    pub fn with_overrides<'a, I>(overrides: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        let mut t = Self::with_defaults();
        for (route, permission) in overrides {
            t.insert(route, permission);
        }
        t
    }

    pub fn insert(&mut self, route: &str, permission: &str) {
        self.map
            .insert(normalize_route(route), permission.trim().to_string());
    }

    pub fn required_for(&self, route: &str) -> Option<&str> {
        self.map.get(&normalize_route(route)).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(r, p)| (r.as_str(), p.as_str()))
    }
}

/// Leading slash, no trailing slash, no query string.
pub fn normalize_route(route: &str) -> String {
    let path = route.split(['?', '#']).next().unwrap_or("").trim();
    let mut s = path.to_string();
    if !s.starts_with('/') {
        s.insert(0, '/');
    }
    while s.ends_with('/') && s.len() > 1 {
        s.pop();
    }
    s
}
