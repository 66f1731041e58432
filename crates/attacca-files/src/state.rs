//! Lifecycle states and the legal transition graph.

/// Lifecycle of one resource's backing file.
///
/// `OpenFailed` and `LoadFailed` are terminal for the attempt, not for the
/// record: the failed operation may be retried, or the record closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FileState {
    Unknown = 0,
    Opening = 1,
    Opened = 2,
    OpenFailed = 3,
    Loading = 4,
    Loaded = 5,
    LoadFailed = 6,
    Unloading = 7,
    Closing = 8,
    Closed = 9,
}

impl FileState {
    pub const ALL: [FileState; 10] = [
        FileState::Unknown,
        FileState::Opening,
        FileState::Opened,
        FileState::OpenFailed,
        FileState::Loading,
        FileState::Loaded,
        FileState::LoadFailed,
        FileState::Unloading,
        FileState::Closing,
        FileState::Closed,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            FileState::Unknown => "unknown",
            FileState::Opening => "opening",
            FileState::Opened => "opened",
            FileState::OpenFailed => "open failed",
            FileState::Loading => "loading",
            FileState::Loaded => "loaded",
            FileState::LoadFailed => "load failed",
            FileState::Unloading => "unloading",
            FileState::Closing => "closing",
            FileState::Closed => "closed",
        }
    }

    pub fn from_u8(raw: u8) -> FileState {
        match raw {
            1 => FileState::Opening,
            2 => FileState::Opened,
            3 => FileState::OpenFailed,
            4 => FileState::Loading,
            5 => FileState::Loaded,
            6 => FileState::LoadFailed,
            7 => FileState::Unloading,
            8 => FileState::Closing,
            9 => FileState::Closed,
            _ => FileState::Unknown,
        }
    }

    /// Legal direct edges of the lifecycle graph.
    pub fn can_transition(self, next: FileState) -> bool {
        use FileState::*;
        matches!(
            (self, next),
            (Unknown, Opening)
                | (Opening, Opened)
                | (Opening, OpenFailed)
                | (Opened, Loading)
                | (Opened, Closing)
                | (OpenFailed, Opening)
                | (OpenFailed, Closing)
                | (Loading, Loaded)
                | (Loading, LoadFailed)
                | (Loaded, Unloading)
                | (LoadFailed, Loading)
                | (LoadFailed, Closing)
                | (Unloading, Opened)
                | (Closing, Closed)
        )
    }

    /// Whether `to` is reachable from `self` along legal edges. Observers
    /// polling published state can miss intermediate hops, so walk checks
    /// use reachability rather than single edges.
    pub fn reaches(self, to: FileState) -> bool {
        if self == to {
            return true;
        }
        let mut seen = [false; 10];
        let mut queue = vec![self];
        seen[self as usize] = true;
        while let Some(from) = queue.pop() {
            for next in FileState::ALL {
                if !seen[next as usize] && from.can_transition(next) {
                    if next == to {
                        return true;
                    }
                    seen[next as usize] = true;
                    queue.push(next);
                }
            }
        }
        false
    }
}

impl std::fmt::Display for FileState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use FileState::*;

    #[test]
    fn test_happy_path_edges() {
        for (from, to) in [
            (Unknown, Opening),
            (Opening, Opened),
            (Opened, Loading),
            (Loading, Loaded),
            (Loaded, Unloading),
            (Unloading, Opened),
            (Opened, Closing),
            (Closing, Closed),
        ] {
            assert!(from.can_transition(to), "{from} -> {to} must be legal");
        }
    }

    #[test]
    fn test_failure_edges_allow_retry_or_close() {
        assert!(Opening.can_transition(OpenFailed));
        assert!(OpenFailed.can_transition(Opening));
        assert!(OpenFailed.can_transition(Closing));
        assert!(Loading.can_transition(LoadFailed));
        assert!(LoadFailed.can_transition(Loading));
        assert!(LoadFailed.can_transition(Closing));
    }

    #[test]
    fn test_no_skipping_states() {
        assert!(!Unknown.can_transition(Opened));
        assert!(!Opened.can_transition(Loaded));
        assert!(!Loaded.can_transition(Opened));
        assert!(!Loaded.can_transition(Closing));
        assert!(!Opening.can_transition(Closing));
        assert!(!Closed.can_transition(Opening));
    }

    #[test]
    fn test_closed_is_terminal() {
        for next in FileState::ALL {
            assert!(!Closed.can_transition(next));
        }
    }

    #[test]
    fn test_reachability_collapses_hops() {
        assert!(Unknown.reaches(Loaded));
        assert!(Unknown.reaches(Closed));
        assert!(Loaded.reaches(Closed));
        assert!(Opening.reaches(Closed));
        assert!(!Closed.reaches(Opened));
        assert!(Opened.reaches(Opened));
    }

    #[test]
    fn test_state_round_trips_through_u8() {
        for state in FileState::ALL {
            assert_eq!(FileState::from_u8(state as u8), state);
        }
        assert_eq!(FileState::from_u8(200), Unknown);
    }
}
