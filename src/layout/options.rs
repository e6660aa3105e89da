//! Layout tuning parameters.

/// Principal direction of flow on the canvas.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LayoutDirection {
    /// Layers advance left to right.
    #[default]
    Right,
    /// Layers advance top to bottom.
    Down,
}

/// Spacing and direction settings fed into the layered engine.
#[derive(Clone, Debug, PartialEq)]
pub struct LayoutOptions {
    /// Gap between nodes sharing a layer.
    pub node_spacing: f64,
    /// Gap between consecutive layers.
    pub layer_spacing: f64,
    /// Clearance between a routed edge and an unrelated node. The built-in
    /// layered engine places boxes only; this is consumed by engines that
    /// also route edge paths.
    pub edge_node_spacing: f64,
    /// Clearance between parallel routed edges. Like
    /// [`edge_node_spacing`](Self::edge_node_spacing), read by edge-routing
    /// engines, not by the built-in box placement.
    pub edge_edge_spacing: f64,
    pub direction: LayoutDirection,
    /// Skip force refinement even for large graphs.
    pub skip_refinement: bool,
    /// Iteration count for the refinement simulation.
    pub refinement_iterations: usize,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            node_spacing: 100.0,
            layer_spacing: 75.0,
            edge_node_spacing: 50.0,
            edge_edge_spacing: 40.0,
            direction: LayoutDirection::default(),
            skip_refinement: false,
            refinement_iterations: 120,
        }
    }
}

impl LayoutOptions {
    /// Defaults with environment overrides applied.
    ///
    /// Reads `FLOWSCAPE_NODE_SPACING` / `FLOWSCAPE_LAYER_SPACING` /
    /// `FLOWSCAPE_SKIP_REFINEMENT`, loading a `.env` file first if present.
    /// Unparseable values fall back silently.
    #[must_use]
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let mut options = Self::default();
        if let Some(value) = env_f64("FLOWSCAPE_NODE_SPACING") {
            options.node_spacing = value;
        }
        if let Some(value) = env_f64("FLOWSCAPE_LAYER_SPACING") {
            options.layer_spacing = value;
        }
        if let Ok(value) = std::env::var("FLOWSCAPE_SKIP_REFINEMENT") {
            options.skip_refinement = matches!(value.as_str(), "1" | "true" | "yes");
        }
        options
    }

    #[must_use]
    pub fn with_direction(mut self, direction: LayoutDirection) -> Self {
        self.direction = direction;
        self
    }

    #[must_use]
    pub fn without_refinement(mut self) -> Self {
        self.skip_refinement = true;
        self
    }
}

fn env_f64(key: &str) -> Option<f64> {
    std::env::var(key).ok()?.parse().ok()
}
