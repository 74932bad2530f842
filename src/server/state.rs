use crate::pipeline::Pipeline;

pub struct AppState<G, F> {
    pub pipeline: Pipeline<G, F>,
    /// Hop limit when `/api/traceroute` is called without `hops`
    pub default_hops: u32,
    pub trace_use_sudo: bool,
}
