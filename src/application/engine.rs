//! Valuation Engine
//!
//! Request-facing facade. Each query fetches one calibration snapshot at call
//! start and computes everything from it, so a rebuild publishing mid-request
//! never mixes two versions in one answer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;

use crate::application::rebuilder::{
    GridRebuilder, RebuildOutcome, RebuildSource, RebuildState,
};
use crate::application::store::CalibrationStore;
use crate::domain::{CalibrationMethod, RiskAssessment, SymbolCalibration, ValuationError};
use crate::ports::CalibrationRecord;
use crate::strategy::{
    BandCoefficientCalculator, BandCoefficients, BandPriceRange, EngineConfig, ParamsError,
    PriceNormalizer, RiskInverter, SignalClassifier,
};

pub struct ValuationEngine {
    store: Arc<CalibrationStore>,
    rebuilder: Arc<GridRebuilder>,
    normalizer: PriceNormalizer,
    inverter: RiskInverter,
    bands: BandCoefficientCalculator,
    classifier: SignalClassifier,
    /// Last risk answered per polynomial symbol and the calibration version it
    /// came from, used as the root tie-break hint
    last_risk: Mutex<HashMap<String, (u64, f64)>>,
}

impl ValuationEngine {
    pub fn new(config: EngineConfig) -> Result<Self, ParamsError> {
        Self::with_store(config, Arc::new(CalibrationStore::new()))
    }

    /// Engine over an existing store
    pub fn with_store(
        config: EngineConfig,
        store: Arc<CalibrationStore>,
    ) -> Result<Self, ParamsError> {
        config.validate()?;

        Ok(Self {
            rebuilder: Arc::new(GridRebuilder::new(Arc::clone(&store))),
            store,
            normalizer: PriceNormalizer::new(config.normalizer),
            inverter: RiskInverter::new(),
            bands: BandCoefficientCalculator::new(config.bands.clone()),
            classifier: SignalClassifier::new(config.classifier, config.bands),
            last_risk: Mutex::new(HashMap::new()),
        })
    }

    pub fn store(&self) -> &Arc<CalibrationStore> {
        &self.store
    }

    /// Load persisted records into the store. Invalid records are logged and
    /// skipped; returns how many were loaded.
    pub fn seed<I>(&self, records: I) -> usize
    where
        I: IntoIterator<Item = CalibrationRecord>,
    {
        let mut loaded = 0;
        for record in records {
            let symbol = record.symbol.clone();
            match SymbolCalibration::try_from(record) {
                Ok(calibration) => {
                    let seeded = if calibration.version() == 0 {
                        self.store.publish(&symbol, calibration).ok()
                    } else {
                        self.store.restore(calibration)
                    };
                    if seeded.is_some() {
                        loaded += 1;
                    }
                }
                Err(e) => tracing::warn!(symbol = %symbol, "Skipping calibration: {}", e),
            }
        }

        tracing::info!("Seeded {} calibrations ({} symbols live)", loaded, self.store.len());
        loaded
    }

    /// Price -> risk assessment for `symbol`
    pub fn get_assessment(
        &self,
        symbol: &str,
        price: f64,
    ) -> Result<RiskAssessment, ValuationError> {
        let snapshot = self.store.get(symbol)?;
        let polynomial = snapshot.method() == CalibrationMethod::Polynomial;

        let prior = if polynomial {
            self.prior_risk(symbol, snapshot.version())
        } else {
            None
        };
        let risk = self.normalizer.price_to_risk(&snapshot, price, prior)?;
        let coefficient = self
            .bands
            .coefficients(snapshot.band_histogram())
            .for_risk(risk);
        let signal = self.classifier.classify(risk, coefficient)?;

        if polynomial {
            self.last_risk
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(symbol.to_string(), (snapshot.version(), risk));
        }

        tracing::debug!(
            symbol,
            price,
            risk,
            coefficient,
            zone = %signal.zone,
            version = snapshot.version(),
            "Assessment"
        );

        Ok(RiskAssessment::new(
            symbol.to_string(),
            price,
            risk,
            coefficient,
            signal,
            snapshot.version(),
            snapshot.method(),
        ))
    }

    /// Risk -> price for `symbol`
    pub fn get_risk_to_price(&self, symbol: &str, risk: f64) -> Result<f64, ValuationError> {
        let snapshot = self.store.get(symbol)?;
        self.inverter.risk_to_price(&snapshot, risk)
    }

    /// Start a background grid rebuild from the live model.
    ///
    /// Fails fast with `NotFound` or `AlreadyInProgress`; otherwise the
    /// returned handle resolves to the rebuild outcome.
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime: the rebuild runs on the
    /// runtime's blocking pool. Use [`apply_source`](Self::apply_source) to
    /// rebuild synchronously without one.
    pub fn trigger_rebuild(
        &self,
        symbol: &str,
    ) -> Result<JoinHandle<Result<RebuildOutcome, ValuationError>>, ValuationError> {
        self.store.get(symbol)?;
        let permit = self.rebuilder.try_begin(symbol)?;

        tracing::info!(symbol, "Rebuild accepted");
        let rebuilder = Arc::clone(&self.rebuilder);
        Ok(tokio::task::spawn_blocking(move || {
            rebuilder.run(permit, RebuildSource::Current)
        }))
    }

    /// Rebuild `symbol` from a changed calibration source, synchronously
    pub fn apply_source(
        &self,
        symbol: &str,
        source: RebuildSource,
    ) -> Result<RebuildOutcome, ValuationError> {
        self.rebuilder.rebuild(symbol, source)
    }

    pub fn rebuild_state(&self, symbol: &str) -> RebuildState {
        self.rebuilder.state(symbol)
    }

    pub fn band_coefficients(&self, symbol: &str) -> Result<BandCoefficients, ValuationError> {
        let snapshot = self.store.get(symbol)?;
        Ok(self.bands.coefficients(snapshot.band_histogram()))
    }

    pub fn band_price_ranges(&self, symbol: &str) -> Result<Vec<BandPriceRange>, ValuationError> {
        let snapshot = self.store.get(symbol)?;
        Ok(self.inverter.band_price_ranges(&snapshot))
    }

    /// Hint from an earlier answer on the same calibration version only
    fn prior_risk(&self, symbol: &str, version: u64) -> Option<f64> {
        self.last_risk
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(symbol)
            .filter(|(seen, _)| *seen == version)
            .map(|(_, risk)| *risk)
    }
}
