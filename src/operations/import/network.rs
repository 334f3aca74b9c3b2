//! Network-storage detection and failure classification
//!
//! Detection is a marker heuristic over the path string: mount-point
//! probing would be more robust, but marker matching is what existing
//! archives were built against and the marker list is configuration, so a
//! deployment can teach it new mounts without a code change.

use std::io;
use std::path::Path;

/// Mount prefixes treated as network storage when no overrides are set
pub const DEFAULT_NETWORK_MARKERS: &[&str] =
    &["//", "\\\\", "/Volumes/", "/mnt/", "/net/", "/run/user/1000/gvfs/"];

/// Worker widths for the bounded stage queues
#[derive(Debug, Clone, Copy)]
pub struct WorkerProfile {
    pub local_workers: usize,
    /// Concurrent operations against network filesystems are empirically
    /// unstable, so this collapses to a near-serial width.
    pub network_workers: usize,
}

impl WorkerProfile {
    /// Hardware-scaled local width, fixed minimal network width
    pub fn detect(local_override: Option<usize>, network_workers: usize) -> Self {
        let local_workers = local_override.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
                .clamp(2, 8)
        });

        Self {
            local_workers,
            network_workers: network_workers.max(1),
        }
    }

    pub fn width(&self, network: bool) -> usize {
        if network {
            self.network_workers
        } else {
            self.local_workers
        }
    }
}

/// Network classification of the session's two endpoints, computed once
/// per import and re-used by every stage that touches the filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct EndpointClass {
    pub source_network: bool,
    pub dest_network: bool,
}

impl EndpointClass {
    pub fn classify(sources: &[std::path::PathBuf], dest: &Path, markers: &[String]) -> Self {
        Self {
            source_network: sources.iter().any(|p| is_network_path(p, markers)),
            dest_network: is_network_path(dest, markers),
        }
    }

    pub fn any_network(&self) -> bool {
        self.source_network || self.dest_network
    }
}

/// Whether a path looks like it lives on network-mounted storage
pub fn is_network_path(path: &Path, markers: &[String]) -> bool {
    let text = path.to_string_lossy();
    if markers.is_empty() {
        DEFAULT_NETWORK_MARKERS.iter().any(|m| text.starts_with(m))
    } else {
        markers.iter().any(|m| text.starts_with(m.as_str()))
    }
}

/// Classify an I/O failure as network-related. These are the error
/// categories a dying share produces; anything else is an ordinary copy
/// error and does not feed the consecutive-failure counter.
pub fn is_network_error(err: &io::Error) -> bool {
    use io::ErrorKind::*;

    if matches!(
        err.kind(),
        ConnectionReset
            | ConnectionAborted
            | ConnectionRefused
            | NotConnected
            | TimedOut
            | BrokenPipe
            | HostUnreachable
            | NetworkUnreachable
            | NetworkDown
    ) {
        return true;
    }

    // Stale NFS handle has no stable ErrorKind yet
    #[cfg(unix)]
    if err.raw_os_error() == Some(libc::ESTALE) {
        return true;
    }

    false
}

/// Tracks consecutive network-classified copy failures for one session.
/// Successes and non-network errors reset the run.
#[derive(Debug)]
pub struct ConsecutiveFailureGuard {
    threshold: u32,
    consecutive: u32,
    last_error: Option<String>,
}

impl ConsecutiveFailureGuard {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            consecutive: 0,
            last_error: None,
        }
    }

    /// Record a network-classified failure. Returns the session-level
    /// failure once the run reaches the threshold.
    pub fn record_network_error(
        &mut self,
        message: &str,
    ) -> Option<crate::operations::import::ImportError> {
        self.consecutive += 1;
        self.last_error = Some(message.to_string());

        (self.consecutive >= self.threshold).then(|| {
            crate::operations::import::ImportError::NetworkFailure {
                consecutive: self.consecutive,
                last_error: self.last_error.clone().unwrap_or_default(),
            }
        })
    }

    /// A success or a non-network error breaks the consecutive run
    pub fn reset(&mut self) {
        self.consecutive = 0;
    }

    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::import::ImportError;
    use std::path::PathBuf;

    #[test]
    fn default_markers_match_shares() {
        assert!(is_network_path(&PathBuf::from("//nas/archive"), &[]));
        assert!(is_network_path(&PathBuf::from("/mnt/share/photos"), &[]));
        assert!(!is_network_path(&PathBuf::from("/home/user/photos"), &[]));
    }

    #[test]
    fn configured_markers_replace_defaults() {
        let markers = vec!["/srv/remote/".to_string()];
        assert!(is_network_path(&PathBuf::from("/srv/remote/x"), &markers));
        // The default /mnt marker no longer applies
        assert!(!is_network_path(&PathBuf::from("/mnt/share"), &markers));
    }

    #[test]
    fn error_kinds_classified() {
        let network = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let other = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert!(is_network_error(&network));
        assert!(!is_network_error(&other));
    }

    #[test]
    fn guard_trips_at_threshold_and_resets_on_success() {
        let mut guard = ConsecutiveFailureGuard::new(5);
        for _ in 0..4 {
            assert!(guard.record_network_error("reset").is_none());
        }
        guard.reset();
        assert_eq!(guard.consecutive(), 0);

        let mut tripped = None;
        for _ in 0..5 {
            tripped = guard.record_network_error("reset");
        }
        match tripped {
            Some(ImportError::NetworkFailure { consecutive, .. }) => assert_eq!(consecutive, 5),
            other => panic!("expected network failure, got {other:?}"),
        }
    }
}
