// state local to tui, synced from DisplayState per loop so keys that
// depend on the transport (play/pause media key) resolve correctly
#[derive(Clone, Debug, Default)]
pub struct TuiState {
    pub playing: bool,
    pub has_signal: bool,
    pub spinner: usize, // advances once per frame while a job is busy
}
