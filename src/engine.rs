//! The top-level handle: a drawing window and a fixed set of banks.

use kurbo::Rect;

use crate::{
    Axis, Bank, BankView, Coefficient, EngineConfig, Error, PixelScale, Polynomial2, QueryKind,
    RangeOutcome, Sign, UnivariatePoly,
};

/// A range-analysis engine for rasterizing algebraic curves.
///
/// The engine holds a drawing window (see [`Engine::setup`]) and a small
/// number of [`Bank`]s, one of which is active at a time. Per-curve operations
/// go to the active bank, so that several curves can be rendered in an
/// interleaved fashion by switching banks with [`Engine::select_cache_entry`].
///
/// ```
/// use cellsign::{Axis, Engine, Polynomial2, QueryKind};
/// use kurbo::Rect;
///
/// let mut engine = Engine::new();
/// assert!(engine.setup(Rect::new(-2.0, -2.0, 2.0, 2.0), 64, 64));
///
/// // The unit circle.
/// let circle = Polynomial2::from_terms([(2, 0, 1i64), (0, 2, 1), (0, 0, -1)]);
/// engine.precompute(&circle).unwrap();
///
/// // Does the row at y = 0 cross the circle between x = 0.5 and x = 1.5?
/// let row = engine.precached_poly(Axis::X, 32.0, 0).unwrap();
/// let out = engine.range_qf(Axis::X, 40.0, 56.0, 32.0, &row, QueryKind::Crossing).unwrap();
/// assert!(out.crossing);
/// ```
#[derive(Clone, Debug)]
pub struct Engine {
    config: EngineConfig,
    scale: Option<PixelScale>,
    banks: Vec<Bank>,
    active: usize,
    last_outcome: RangeOutcome,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// An engine with the default configuration.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// An engine with a custom configuration.
    ///
    /// There's always at least one bank, even if `config` asks for none.
    pub fn with_config(config: EngineConfig) -> Self {
        let banks = (0..config.banks.max(1)).map(|_| Bank::new(&config)).collect();
        Engine {
            config,
            scale: None,
            banks,
            active: 0,
            last_outcome: RangeOutcome::default(),
        }
    }

    /// The configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Sets the drawing window and its resolution in pixels.
    ///
    /// Returns false (and leaves the engine unchanged) if the window is
    /// degenerate or the resolution is out of range; in that case the caller
    /// shouldn't go on to precompute or evaluate anything.
    ///
    /// Cached polynomials are keyed by real coordinates, so they stay valid
    /// across setups.
    pub fn setup(&mut self, window: Rect, res_w: u32, res_h: u32) -> bool {
        match PixelScale::new(window, res_w, res_h, self.config.resolution()) {
            Ok(scale) => {
                log::debug!("set up a {res_w}x{res_h} window over {window:?}");
                self.scale = Some(scale);
                true
            }
            Err(e) => {
                log::warn!("rejected window setup: {e}");
                false
            }
        }
    }

    /// The drawing window, if one has been set up.
    pub fn scale(&self) -> Option<&PixelScale> {
        self.scale.as_ref()
    }

    /// Precomputes `poly` into the active bank, discarding whatever that bank
    /// had cached before.
    ///
    /// On error, the active bank is unchanged.
    pub fn precompute<C: Coefficient>(&mut self, poly: &Polynomial2<C>) -> Result<(), Error> {
        self.banks[self.active].precompute(poly, &self.config)
    }

    /// Makes bank `index` the active one.
    ///
    /// Nothing is recomputed: the bank's curve and caches are exactly as they
    /// were when it was last active.
    pub fn select_cache_entry(&mut self, index: usize) -> Result<(), Error> {
        if index >= self.banks.len() {
            return Err(Error::BankOutOfRange {
                index,
                count: self.banks.len(),
            });
        }
        log::debug!("switching from bank {} to bank {index}", self.active);
        self.active = index;
        Ok(())
    }

    /// The index of the active bank.
    pub fn active_index(&self) -> usize {
        self.active
    }

    /// The active bank.
    pub fn active_bank(&self) -> &Bank {
        &self.banks[self.active]
    }

    /// The bank with index `index`, if there is one.
    pub fn bank(&self, index: usize) -> Option<&Bank> {
        self.banks.get(index)
    }

    /// The number of banks.
    pub fn bank_count(&self) -> usize {
        self.banks.len()
    }

    /// Empties every bank, including its precomputed curve.
    ///
    /// Every bank needs to be precomputed again before it's used.
    pub fn clear_caches(&mut self) {
        log::debug!("clearing all {} banks", self.banks.len());
        for bank in &mut self.banks {
            bank.clear();
        }
        self.last_outcome = RangeOutcome::default();
    }

    /// A view of the active bank, for running several operations in a row.
    pub fn view(&mut self) -> Result<BankView<'_>, Error> {
        self.view_at_level(0)
    }

    /// A view of the active bank, at subdivision level `level`.
    pub fn view_at_level(&mut self, level: u32) -> Result<BankView<'_>, Error> {
        let scale = self.scale.as_ref().ok_or(Error::NoSetup)?;
        let bank = &mut self.banks[self.active];
        Ok(BankView::new(scale, bank, &self.config).at_level(level))
    }

    /// Fixes the coordinate across `axis` at the pixel-relative `key`; see
    /// [`BankView::precached_poly`].
    pub fn precached_poly(
        &mut self,
        axis: Axis,
        key: f64,
        level: u32,
    ) -> Result<UnivariatePoly, Error> {
        self.view_at_level(level)?.precached_poly(axis, key, level)
    }

    /// The exact sign of the active curve at a point; see
    /// [`BankView::evaluate_generic`].
    ///
    /// This runs at subdivision level 0, so the result is always cached. When
    /// working at a deeper level, go through [`Engine::view_at_level`] instead,
    /// so that the configured cache depth is respected.
    pub fn evaluate_generic(
        &mut self,
        axis: Axis,
        coord: f64,
        key: f64,
        poly: &UnivariatePoly,
    ) -> Result<Sign, Error> {
        self.view()?.evaluate_generic(axis, coord, key, poly)
    }

    /// The exact sign of a partial derivative of the active curve; see
    /// [`BankView::partial_derivative_sign`].
    pub fn partial_derivative_sign(&mut self, wrt: Axis, px: f64, py: f64) -> Result<Sign, Error> {
        self.view()?.partial_derivative_sign(wrt, px, py)
    }

    /// Range analysis with quadratic forms; see [`BankView::range_qf`].
    ///
    /// Like [`Engine::evaluate_generic`], this caches the endpoint signs as
    /// level 0 would; use [`Engine::view_at_level`] for deeper levels.
    pub fn range_qf(
        &mut self,
        axis: Axis,
        lower: f64,
        upper: f64,
        key: f64,
        poly: &UnivariatePoly,
        kind: QueryKind,
    ) -> Result<RangeOutcome, Error> {
        let out = self.view()?.range_qf(axis, lower, upper, key, poly, kind)?;
        self.last_outcome = out;
        Ok(out)
    }

    /// Range analysis with modified affine arithmetic; see [`BankView::range_maa`].
    ///
    /// Like [`Engine::evaluate_generic`], this caches the endpoint signs as
    /// level 0 would; use [`Engine::view_at_level`] for deeper levels.
    pub fn range_maa(
        &mut self,
        axis: Axis,
        lower: f64,
        upper: f64,
        key: f64,
        poly: &UnivariatePoly,
        kind: QueryKind,
    ) -> Result<RangeOutcome, Error> {
        let out = self.view()?.range_maa(axis, lower, upper, key, poly, kind)?;
        self.last_outcome = out;
        Ok(out)
    }

    /// The outcome of the most recent successful range query.
    pub fn last_outcome(&self) -> RangeOutcome {
        self.last_outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn circle() -> Polynomial2<i64> {
        Polynomial2::from_terms([(2, 0, 1), (0, 2, 1), (0, 0, -1)])
    }

    // (x - 1/2)^2 + y^2 - 1, a shifted circle.
    fn shifted() -> Polynomial2<f64> {
        Polynomial2::from_terms([(2, 0, 1.0), (1, 0, -1.0), (0, 2, 1.0), (0, 0, -0.75)])
    }

    fn engine() -> Engine {
        let mut engine = Engine::new();
        assert!(engine.setup(Rect::new(-2.0, -2.0, 2.0, 2.0), 64, 64));
        engine
    }

    #[test]
    fn setup_failure_keeps_state() {
        let mut engine = engine();
        let before = engine.scale().cloned();
        assert!(!engine.setup(Rect::new(1.0, 0.0, 1.0, 2.0), 64, 64));
        assert!(!engine.setup(Rect::new(0.0, 0.0, 1.0, 1.0), 4, 64));
        assert!(!engine.setup(Rect::new(0.0, 0.0, 1.0, 1.0), 64, 2000));
        assert_eq!(engine.scale().cloned(), before);
    }

    #[test]
    fn requires_setup() {
        let mut engine = Engine::new();
        engine.precompute(&circle()).unwrap();
        assert_matches!(engine.precached_poly(Axis::X, 1.0, 0), Err(Error::NoSetup));
    }

    #[test]
    fn bank_out_of_range() {
        let mut engine = engine();
        assert_eq!(
            engine.select_cache_entry(2),
            Err(Error::BankOutOfRange { index: 2, count: 2 })
        );
        assert_eq!(engine.active_index(), 0);
    }

    #[test_log::test]
    fn banks_are_independent() {
        let mut engine = engine();
        engine.precompute(&circle()).unwrap();
        let a = engine.precached_poly(Axis::X, 32.0, 0).unwrap();
        let sign_a = engine.evaluate_generic(Axis::X, 32.0, 32.0, &a).unwrap();
        assert_eq!(sign_a, Sign::Negative);

        engine.select_cache_entry(1).unwrap();
        assert!(!engine.active_bank().has_polynomial());
        engine.precompute(&shifted()).unwrap();
        let b = engine.precached_poly(Axis::X, 32.0, 0).unwrap();
        assert_ne!(a, b);
        // x = 1.5 is on the shifted circle but outside the unit one.
        assert_eq!(engine.evaluate_generic(Axis::X, 56.0, 32.0, &b).unwrap(), Sign::Zero);

        engine.select_cache_entry(0).unwrap();
        let cache = engine.active_bank().poly_cache(Axis::X);
        let (hits, len) = (cache.hits(), cache.len());
        assert_eq!(engine.precached_poly(Axis::X, 32.0, 0).unwrap(), a);
        assert_eq!(engine.active_bank().poly_cache(Axis::X).hits(), hits + 1);
        assert_eq!(engine.active_bank().poly_cache(Axis::X).len(), len);
        assert_eq!(engine.evaluate_generic(Axis::X, 56.0, 32.0, &a).unwrap(), Sign::Positive);
    }

    #[test]
    fn clear_drops_everything() {
        let mut engine = engine();
        engine.precompute(&circle()).unwrap();
        engine.precached_poly(Axis::Y, 3.0, 0).unwrap();
        engine.clear_caches();
        assert!(engine.active_bank().poly_cache(Axis::Y).is_empty());
        assert_matches!(engine.precached_poly(Axis::Y, 3.0, 0), Err(Error::NoPolynomial));
    }

    #[test]
    fn failed_precompute_keeps_bank() {
        let mut engine = engine();
        engine.precompute(&Polynomial2::from_terms([(1, 0, 1.0), (0, 0, -0.5)])).unwrap();
        assert_eq!(
            engine.precompute(&Polynomial2::from_terms([(1, 0, f64::INFINITY)])),
            Err(Error::NonFiniteCoefficient)
        );
        assert_eq!(engine.active_bank().degree(Axis::X), Some(1));
    }

    #[test]
    fn records_last_outcome() {
        let mut engine = engine();
        engine.precompute(&circle()).unwrap();
        let row = engine.precached_poly(Axis::X, 32.0, 0).unwrap();
        let out = engine
            .range_maa(Axis::X, 24.0, 40.0, 32.0, &row, QueryKind::FirstDerivative)
            .unwrap();
        assert!(out.first_derivative_straddles);
        assert_eq!(engine.last_outcome(), out);
        let out = engine.range_qf(Axis::X, 48.0, 56.0, 32.0, &row, QueryKind::Crossing).unwrap();
        assert!(out.zero_bounds);
        assert_eq!(engine.last_outcome(), out);
    }

    #[test]
    fn deep_levels_skip_caches() {
        let mut engine = engine();
        engine.precompute(&circle()).unwrap();
        let mut view = engine.view_at_level(30).unwrap();
        let row = view.precached_poly(Axis::X, 5.0, 30).unwrap();
        view.evaluate_generic(Axis::X, 7.0, 5.0, &row).unwrap();
        let bank = engine.active_bank();
        assert!(bank.poly_cache(Axis::X).is_empty());
        assert!(bank.eval_cache().is_empty());
    }

    #[test]
    fn range_queries_respect_the_view_level() {
        let mut engine = engine();
        engine.precompute(&circle()).unwrap();
        let row = engine.precached_poly(Axis::X, 32.0, 0).unwrap();
        let deep = engine.config().max_eval_cache_level;

        let mut view = engine.view_at_level(deep).unwrap();
        let qf = view
            .range_qf(Axis::X, 47.5, 48.5, 32.0, &row, QueryKind::Enclosure)
            .unwrap();
        let maa = view
            .range_maa(Axis::X, 47.5, 48.5, 32.0, &row, QueryKind::Enclosure)
            .unwrap();
        assert!(qf.crossing && maa.crossing);
        assert!(engine.active_bank().eval_cache().is_empty());

        // The facade works at level 0, where endpoint signs are cached.
        let out = engine
            .range_qf(Axis::X, 47.5, 48.5, 32.0, &row, QueryKind::Enclosure)
            .unwrap();
        assert_eq!(out, qf);
        assert_eq!(engine.active_bank().eval_cache().len(), 2);
    }
}
