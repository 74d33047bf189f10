/// Counters describing the last synthesized block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Statistics {
    /// Registered sources, including those waiting to be reclaimed.
    pub number_of_sources: usize,
    /// Partials in the active-track table.
    pub active_tracks: usize,
    /// Tracks found inaudible by the masking pass.
    pub masked_tracks: usize,
    /// Tracks with a positive amplitude that survived masking.
    pub audible_tracks: usize,
    /// Partials that could not enter the full active-track table.
    pub dropped_tracks: usize,
}
