//! Terminal host for notices and navigation.
//!
//! Notices go to stderr so stdout carries only JSON output. A blocking
//! notice (the session-expired prompt) is printed when raised; the caller
//! later waits for Enter via [`wait_for_acknowledgment`] and acknowledges.

use portal::session::{Navigator, Notice, NoticeKind, NoticeSurface};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Debug, Default)]
pub struct TerminalSurface;

impl NoticeSurface for TerminalSurface {
    fn show(&self, notice: &Notice) {
        let marker = match notice.kind {
            NoticeKind::SessionExpired | NoticeKind::Error => "!",
            NoticeKind::Success => "+",
            NoticeKind::Info => "*",
        };
        eprintln!("[{marker}] {}: {}", notice.title, notice.message);
        if notice.blocking {
            eprintln!("    press Enter to {}", notice.action.to_lowercase());
        }
    }

    fn dismiss(&self, notice: &Notice) {
        tracing::debug!(title = %notice.title, "notice dismissed");
    }
}

/// Renders navigation as a hint; the CLI has no views to switch between.
#[derive(Debug)]
pub struct TerminalNavigator {
    pub login_path: String,
}

impl Navigator for TerminalNavigator {
    fn navigate(&self, path: &str) {
        if path == self.login_path {
            eprintln!("session cleared; run `portal-cli login` to sign in again");
        } else {
            eprintln!("-> {path}");
        }
    }
}

/// Block until the user presses Enter (or stdin closes).
pub async fn wait_for_acknowledgment() {
    let mut line = String::new();
    let mut stdin = BufReader::new(tokio::io::stdin());
    if let Err(e) = stdin.read_line(&mut line).await {
        tracing::debug!(error = %e, "stdin unavailable, acknowledging");
    }
}
