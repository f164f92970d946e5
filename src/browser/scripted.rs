//! Scripted in-memory sessions for tests
//!
//! Each watch URL is mapped to a [`Script`] describing what the page does
//! once navigated to. The factory counts opened and released sessions so
//! tests can assert that no session outlives its episode.

use super::{BrowserError, BrowserSession, SessionFactory};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Behavior of one scripted page
#[derive(Debug, Clone)]
pub(crate) enum Script {
    /// Markup snapshots returned by successive reads; the last one repeats
    Snapshots(Vec<String>),
    /// Navigation to the page fails
    NavigationFails,
    /// The session dies when the markup is read
    CrashOnRead,
    /// Every key press fails, markup reads follow the snapshots
    KeysFail(Vec<String>),
}

/// Counters shared between a factory and its sessions
#[derive(Debug, Default)]
pub(crate) struct SessionLog {
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
    pub key_presses: AtomicUsize,
    pub markup_reads: AtomicUsize,
}

impl SessionLog {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn key_presses(&self) -> usize {
        self.key_presses.load(Ordering::SeqCst)
    }

    pub fn markup_reads(&self) -> usize {
        self.markup_reads.load(Ordering::SeqCst)
    }
}

/// Factory handing out scripted sessions
#[derive(Debug, Default)]
pub(crate) struct ScriptedFactory {
    scripts: HashMap<String, Script>,
    fail_launch: bool,
    pub log: Arc<SessionLog>,
}

impl ScriptedFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the behavior of the page at `url`
    pub fn with_page(mut self, url: impl Into<String>, script: Script) -> Self {
        self.scripts.insert(url.into(), script);
        self
    }

    /// Makes every `open_session` call fail
    pub fn failing_launch(mut self) -> Self {
        self.fail_launch = true;
        self
    }
}

impl SessionFactory for ScriptedFactory {
    fn open_session(&self) -> Result<Box<dyn BrowserSession>, BrowserError> {
        if self.fail_launch {
            return Err(BrowserError::LaunchFailed("scripted launch failure".to_string()));
        }

        self.log.opened.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(ScriptedSession {
            scripts: self.scripts.clone(),
            current: RefCell::new(None),
            reads: RefCell::new(0),
            log: Arc::clone(&self.log),
        }))
    }
}

pub(crate) struct ScriptedSession {
    scripts: HashMap<String, Script>,
    current: RefCell<Option<Script>>,
    reads: RefCell<usize>,
    log: Arc<SessionLog>,
}

impl ScriptedSession {
    fn snapshot(snapshots: &[String], index: usize) -> String {
        snapshots
            .get(index)
            .or_else(|| snapshots.last())
            .cloned()
            .unwrap_or_default()
    }
}

impl BrowserSession for ScriptedSession {
    fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        match self.scripts.get(url) {
            Some(Script::NavigationFails) | None => Err(BrowserError::NavigationFailed {
                url: url.to_string(),
                message: "scripted navigation failure".to_string(),
            }),
            Some(script) => {
                *self.current.borrow_mut() = Some(script.clone());
                Ok(())
            }
        }
    }

    fn current_markup(&self) -> Result<String, BrowserError> {
        self.log.markup_reads.fetch_add(1, Ordering::SeqCst);

        let index = {
            let mut reads = self.reads.borrow_mut();
            *reads += 1;
            *reads - 1
        };

        match self.current.borrow().as_ref() {
            Some(Script::Snapshots(snapshots)) | Some(Script::KeysFail(snapshots)) => {
                Ok(Self::snapshot(snapshots, index))
            }
            Some(Script::CrashOnRead) => Err(BrowserError::ContentUnavailable(
                "scripted session crash".to_string(),
            )),
            Some(Script::NavigationFails) | None => Ok(String::new()),
        }
    }

    fn dispatch_key(&self, key: &str) -> Result<(), BrowserError> {
        self.log.key_presses.fetch_add(1, Ordering::SeqCst);

        match self.current.borrow().as_ref() {
            Some(Script::KeysFail(_)) => Err(BrowserError::InputFailed {
                key: key.to_string(),
                message: "scripted input failure".to_string(),
            }),
            _ => Ok(()),
        }
    }
}

impl Drop for ScriptedSession {
    fn drop(&mut self) {
        self.log.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Markup of a page whose player has emitted the given source URLs
pub(crate) fn player_markup(sources: &[&str]) -> String {
    let mut html = String::from("<html><body><div id=\"player\">");
    for source in sources {
        html.push_str(&format!("<video><source src=\"{}\"></video>", source));
    }
    html.push_str("</div></body></html>");
    html
}

/// Markup of a page that has not loaded its player yet
pub(crate) fn loading_markup() -> String {
    "<html><body><div class=\"spinner\">Loading…</div><script src=\"https://cdn.example/app.js\"></script></body></html>".to_string()
}
