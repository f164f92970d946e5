//! Headless Chromium sessions backed by `headless_chrome`

use super::{BrowserError, BrowserSession, SessionFactory};
use crate::browser_provisioning::{ProvisioningError, ensure_browser_available};
use crate::config::BrowserSettings;
use crate::temp::{TempGuard, create_temp_dir};
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Flags passed to every browser instance
const CHROME_FLAGS: &[&str] = &["--disable-dev-shm-usage", "--disable-gpu", "--mute-audio"];

/// Launches one headless Chromium process per session
pub struct ChromeSessionFactory {
    executable: PathBuf,
    window_size: (u32, u32),
    idle_timeout: Duration,
    page_load_timeout: Duration,
}

impl ChromeSessionFactory {
    /// Resolves the browser executable and prepares the factory
    ///
    /// Resolution order:
    /// 1. `settings.executable` (explicit override)
    /// 2. A system installation found by `headless_chrome`
    /// 3. A pinned headless shell downloaded into the cache, when
    ///    `settings.auto_provision` is enabled
    pub fn new(settings: &BrowserSettings) -> Result<Self, BrowserError> {
        let executable = match &settings.executable {
            Some(path) if path.is_file() => path.clone(),
            Some(path) => {
                return Err(ProvisioningError::ExecutableMissing(path.clone()).into());
            }
            None => match headless_chrome::browser::default_executable() {
                Ok(path) => path,
                Err(reason) if settings.auto_provision => {
                    info!(%reason, "no system browser found, provisioning headless shell");
                    ensure_browser_available()?
                }
                Err(reason) => return Err(ProvisioningError::NotFound(reason).into()),
            },
        };

        info!(executable = %executable.display(), "using browser executable");

        Ok(Self {
            executable,
            window_size: settings.window_size,
            idle_timeout: settings.idle_timeout(),
            page_load_timeout: settings.page_load_timeout(),
        })
    }

    fn launch_options(&self, profile: &TempGuard) -> Result<LaunchOptions<'static>, BrowserError> {
        LaunchOptions::default_builder()
            .headless(true)
            .sandbox(false)
            .window_size(Some(self.window_size))
            .path(Some(self.executable.clone()))
            .user_data_dir(Some(profile.path().to_path_buf()))
            .idle_browser_timeout(self.idle_timeout)
            .args(CHROME_FLAGS.iter().map(|flag| OsStr::new(*flag)).collect())
            .build()
            .map_err(|e| BrowserError::LaunchFailed(e.to_string()))
    }
}

impl SessionFactory for ChromeSessionFactory {
    fn open_session(&self) -> Result<Box<dyn BrowserSession>, BrowserError> {
        let profile = create_temp_dir("miruro_profile")
            .map_err(|e| BrowserError::LaunchFailed(format!("profile directory: {}", e)))?;

        let browser = Browser::new(self.launch_options(&profile)?)
            .map_err(|e| BrowserError::LaunchFailed(format!("{:#}", e)))?;

        let tab = browser
            .new_tab()
            .map_err(|e| BrowserError::LaunchFailed(format!("{:#}", e)))?;
        // Bounds navigation waits as well as element lookups
        tab.set_default_timeout(self.page_load_timeout);

        debug!(profile = %profile.display(), "browser session opened");

        Ok(Box::new(ChromeSession {
            tab,
            _browser: browser,
            _profile: profile,
        }))
    }
}

/// A single tab in its own browser process
///
/// Field order matters for drop: the tab goes first, then the browser process
/// is killed, then the profile directory is removed.
struct ChromeSession {
    tab: Arc<Tab>,
    _browser: Browser,
    _profile: TempGuard,
}

impl BrowserSession for ChromeSession {
    fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        self.tab
            .navigate_to(url)
            .and_then(|tab| tab.wait_until_navigated())
            .map(|_| ())
            .map_err(|e| BrowserError::NavigationFailed {
                url: url.to_string(),
                message: format!("{:#}", e),
            })
    }

    fn current_markup(&self) -> Result<String, BrowserError> {
        self.tab
            .get_content()
            .map_err(|e| BrowserError::ContentUnavailable(format!("{:#}", e)))
    }

    fn dispatch_key(&self, key: &str) -> Result<(), BrowserError> {
        let input_failed = |e: &dyn std::fmt::Display| BrowserError::InputFailed {
            key: key.to_string(),
            message: e.to_string(),
        };

        // Focus the body first so the player receives the key
        self.tab
            .find_element("body")
            .and_then(|body| body.click().map(|_| ()))
            .map_err(|e| input_failed(&e))?;

        self.tab
            .press_key(key)
            .map(|_| ())
            .map_err(|e| input_failed(&e))
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        debug!("closing browser session");
    }
}
