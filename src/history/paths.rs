//! Well-known history database locations.
//!
//! The defaults are a plain table: one row per (OS family, browser, candidate),
//! tried in table order. Adding a browser or a platform means adding rows.

use crate::collector::types::Browser;
use crate::history::{HistoryCandidate, HistorySource};
use std::path::{Path, PathBuf};

/// Directory a candidate path is relative to.
#[derive(Debug, Clone, Copy)]
enum BaseDir {
    Home,
    /// `%LOCALAPPDATA%`
    LocalAppData,
    /// `%APPDATA%`
    RoamingAppData,
}

/// How the candidate resolves to a database file.
#[derive(Debug, Clone, Copy)]
enum Target {
    /// The path is the database itself
    File,
    /// The path is a directory of profiles, each holding this file
    Profiles(&'static str),
}

struct DefaultCandidate {
    os: &'static str,
    browser: Browser,
    base: BaseDir,
    components: &'static [&'static str],
    target: Target,
}

const DEFAULT_CANDIDATES: &[DefaultCandidate] = &[
    // Chrome family
    DefaultCandidate {
        os: "windows",
        browser: Browser::Chrome,
        base: BaseDir::LocalAppData,
        components: &["Google", "Chrome", "User Data", "Default", "History"],
        target: Target::File,
    },
    DefaultCandidate {
        os: "windows",
        browser: Browser::Chrome,
        base: BaseDir::LocalAppData,
        components: &["Chromium", "User Data", "Default", "History"],
        target: Target::File,
    },
    DefaultCandidate {
        os: "macos",
        browser: Browser::Chrome,
        base: BaseDir::Home,
        components: &["Library", "Application Support", "Google", "Chrome", "Default", "History"],
        target: Target::File,
    },
    DefaultCandidate {
        os: "macos",
        browser: Browser::Chrome,
        base: BaseDir::Home,
        components: &["Library", "Application Support", "Chromium", "Default", "History"],
        target: Target::File,
    },
    DefaultCandidate {
        os: "linux",
        browser: Browser::Chrome,
        base: BaseDir::Home,
        components: &[".config", "google-chrome", "Default", "History"],
        target: Target::File,
    },
    DefaultCandidate {
        os: "linux",
        browser: Browser::Chrome,
        base: BaseDir::Home,
        components: &[".config", "chromium", "Default", "History"],
        target: Target::File,
    },
    // Firefox family
    DefaultCandidate {
        os: "windows",
        browser: Browser::Firefox,
        base: BaseDir::RoamingAppData,
        components: &["Mozilla", "Firefox", "Profiles"],
        target: Target::Profiles("places.sqlite"),
    },
    DefaultCandidate {
        os: "macos",
        browser: Browser::Firefox,
        base: BaseDir::Home,
        components: &["Library", "Application Support", "Firefox", "Profiles"],
        target: Target::Profiles("places.sqlite"),
    },
    DefaultCandidate {
        os: "linux",
        browser: Browser::Firefox,
        base: BaseDir::Home,
        components: &[".mozilla", "firefox"],
        target: Target::Profiles("places.sqlite"),
    },
];

/// The OS family used to pick default rows.
pub fn os_family() -> &'static str {
    match std::env::consts::OS {
        "windows" => "windows",
        "macos" => "macos",
        _ => "linux",
    }
}

/// Default sources for the running platform.
pub fn default_sources() -> Vec<HistorySource> {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    let local = dirs::data_local_dir().unwrap_or_else(|| home.join("AppData").join("Local"));
    let roaming = dirs::data_dir().unwrap_or_else(|| home.join("AppData").join("Roaming"));
    default_sources_for(os_family(), &home, &local, &roaming)
}

/// Default sources for `os`, resolved against the given base directories.
pub fn default_sources_for(
    os: &str,
    home: &Path,
    local_app_data: &Path,
    roaming_app_data: &Path,
) -> Vec<HistorySource> {
    let mut sources: Vec<HistorySource> = Vec::new();

    for row in DEFAULT_CANDIDATES.iter().filter(|row| row.os == os) {
        let base = match row.base {
            BaseDir::Home => home,
            BaseDir::LocalAppData => local_app_data,
            BaseDir::RoamingAppData => roaming_app_data,
        };
        let path = row.components.iter().fold(base.to_path_buf(), |p, c| p.join(c));
        let candidate = match row.target {
            Target::File => HistoryCandidate::File { path },
            Target::Profiles(file_name) => HistoryCandidate::Profiles {
                root: path,
                file_name: file_name.to_string(),
            },
        };

        match sources.iter_mut().find(|s| s.browser == row.browser) {
            Some(source) => source.candidates.push(candidate),
            None => sources.push(HistorySource {
                browser: row.browser,
                candidates: vec![candidate],
            }),
        }
    }

    sources
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linux_defaults() {
        let home = Path::new("/home/u");
        let sources = default_sources_for("linux", home, home, home);

        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].browser, Browser::Chrome);
        assert_eq!(
            sources[0].candidates,
            vec![
                HistoryCandidate::File {
                    path: PathBuf::from("/home/u/.config/google-chrome/Default/History")
                },
                HistoryCandidate::File {
                    path: PathBuf::from("/home/u/.config/chromium/Default/History")
                },
            ]
        );
        assert_eq!(sources[1].browser, Browser::Firefox);
        assert_eq!(
            sources[1].candidates,
            vec![HistoryCandidate::Profiles {
                root: PathBuf::from("/home/u/.mozilla/firefox"),
                file_name: "places.sqlite".to_string(),
            }]
        );
    }

    #[test]
    fn test_windows_uses_app_data_dirs() {
        let sources = default_sources_for(
            "windows",
            Path::new("C:/Users/u"),
            Path::new("C:/Local"),
            Path::new("C:/Roaming"),
        );
        let chrome = &sources[0].candidates[0];
        let firefox = &sources[1].candidates[0];

        assert!(matches!(chrome, HistoryCandidate::File { path } if path.starts_with("C:/Local")));
        assert!(
            matches!(firefox, HistoryCandidate::Profiles { root, .. } if root.starts_with("C:/Roaming"))
        );
    }

    #[test]
    fn test_every_family_has_both_browsers() {
        for os in ["windows", "macos", "linux"] {
            let home = Path::new("/h");
            let browsers: Vec<Browser> = default_sources_for(os, home, home, home)
                .into_iter()
                .map(|s| s.browser)
                .collect();
            assert_eq!(browsers, vec![Browser::Chrome, Browser::Firefox], "{os}");
        }
    }
}
