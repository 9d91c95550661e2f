use std::time::Duration;

/// How long the splash screen stays up before moving to Home.
pub const SPLASH_DURATION: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Splash,
    Home,
    Camera,
    Result,
    Records,
    Settings,
}

impl Route {
    pub const ALL: [Route; 6] = [
        Route::Splash,
        Route::Home,
        Route::Camera,
        Route::Result,
        Route::Records,
        Route::Settings,
    ];

    pub const fn path(self) -> &'static str {
        match self {
            Self::Splash => "/",
            Self::Home => "/home",
            Self::Camera => "/camera",
            Self::Result => "/result",
            Self::Records => "/records",
            Self::Settings => "/settings",
        }
    }

    pub fn from_path(path: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|route| route.path() == path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TabItem {
    pub label: &'static str,
    pub route: Route,
    pub active: bool,
}

const TABS: [(&str, Route); 4] = [
    ("Home", Route::Home),
    ("Camera", Route::Camera),
    ("Records", Route::Records),
    ("Settings", Route::Settings),
];

pub fn is_tab_active(tab: Route, current_path: &str) -> bool {
    tab.path() == current_path
}

pub fn tab_bar(current_path: &str) -> Vec<TabItem> {
    TABS.iter()
        .map(|&(label, route)| TabItem {
            label,
            route,
            active: is_tab_active(route, current_path),
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct NavigationShell {
    current: Route,
    history: Vec<Route>,
}

impl NavigationShell {
    pub fn new() -> Self {
        Self {
            current: Route::Splash,
            history: Vec::new(),
        }
    }

    pub fn current(&self) -> Route {
        self.current
    }

    pub fn history(&self) -> &[Route] {
        &self.history
    }

    /// Moves to `route` and returns the route that was left.
    pub fn navigate(&mut self, route: Route) -> Route {
        let previous = self.current;
        if previous != route {
            tracing::debug!(from = previous.path(), to = route.path(), "navigate");
            self.history.push(previous);
            self.current = route;
        }
        previous
    }

    pub fn tab_bar(&self) -> Vec<TabItem> {
        tab_bar(self.current.path())
    }

    /// Leaves the splash screen once it has been shown long enough.
    pub fn advance_splash(&mut self, elapsed: Duration) -> bool {
        if self.current == Route::Splash && elapsed >= SPLASH_DURATION {
            self.navigate(Route::Home);
            return true;
        }
        false
    }
}

impl Default for NavigationShell {
    fn default() -> Self {
        Self::new()
    }
}
