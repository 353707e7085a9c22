/// Tunable limits and policies for an [`Engine`](crate::Engine).
///
/// The defaults are sized for rendering a handful of curves at up to
/// 1024x1024 pixels.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// The number of independent banks.
    pub banks: usize,
    /// The maximum number of cached univariate polynomials, per bank and axis.
    pub poly_cache_capacity: usize,
    /// The maximum number of cached signs, per bank.
    pub eval_cache_capacity: usize,
    /// Subdivision levels at or beyond this don't use the polynomial cache.
    ///
    /// Deep in the subdivision, coordinates hardly ever repeat and caching
    /// them would only push out useful entries. Zero turns the cache off.
    pub max_poly_cache_level: u32,
    /// Subdivision levels at or beyond this don't use the evaluation cache.
    pub max_eval_cache_level: u32,
    /// The highest derivative order that range analysis recurses through.
    pub max_recursive_derivative: usize,
    /// The smallest supported horizontal or vertical resolution.
    pub min_resolution: u32,
    /// The largest supported horizontal or vertical resolution.
    pub max_resolution: u32,
    /// Whether to try the modular zero test before exact evaluation.
    ///
    /// Turn this off for coefficient domains with no useful modular image.
    pub modular_enabled: bool,
    /// Whether a vanishing modular residue counts as an exact zero.
    ///
    /// This is faster but only probabilistically correct, so it's off by default.
    pub trust_modular_zero: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            banks: 2,
            poly_cache_capacity: 2 * 1024 * 1024,
            eval_cache_capacity: 3 * 1024 * 1024,
            max_poly_cache_level: 12,
            max_eval_cache_level: 12,
            max_recursive_derivative: 7,
            min_resolution: 5,
            max_resolution: 1024,
            modular_enabled: true,
            trust_modular_zero: false,
        }
    }
}

impl EngineConfig {
    /// The supported range of resolutions.
    pub fn resolution(&self) -> std::ops::RangeInclusive<u32> {
        self.min_resolution..=self.max_resolution
    }
}
