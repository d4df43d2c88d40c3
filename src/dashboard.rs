// src/dashboard.rs

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::cache::DatasetCache;
use crate::config::DashboardConfig;
use crate::fetch::{fetch_bytes, Source};
use crate::load::load_operator_observations;
use crate::render::{render_page, render_statement, Drilldown};
use crate::reshape::{rank_rows, reshape, PivotMatrix, ReshapeOptions};
use crate::st53::{available_operators, available_schemes, OperatorFilter, OperatorView};
use crate::types::{DateRange, Month, Observation, OperatorSchemeObservation, Unit};

pub const TITLE: &str = "WCSB Oil Supply & Disposition Summary";
pub const OPERATOR_TITLE: &str = "WCSB ST53 Bitumen Production Dashboard";
pub const FOOTER: &str = "Data via Alberta Energy Regulator";

/// What the user picked in the controls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewRequest {
    pub unit: Unit,
    pub start: Option<Month>,
    pub end: Option<Month>,
    /// Re-read the sources instead of reusing the cached load
    pub refresh: bool,
}

#[derive(Debug, Clone)]
pub struct RenderedView {
    pub html: String,
    pub range: DateRange,
    pub unit: Unit,
    pub matrix: PivotMatrix,
    pub drilldown: Option<PivotMatrix>,
}

/// Dataset bounds, and the requested range inside them. Missing bounds fall
/// back to the trailing window ending at the newest month.
pub fn resolve_range(
    observations: &[Observation],
    start: Option<Month>,
    end: Option<Month>,
    window_months: u32,
) -> Result<(DateRange, DateRange)> {
    let bounds = DateRange::covering(observations.iter().filter_map(|o| o.date))
        .ok_or_else(|| anyhow!("dataset has no rows with a valid date"))?;
    let default = DateRange::trailing(bounds.end, window_months).clamp(&bounds);
    let wanted = DateRange::new(start.unwrap_or(default.start), end.unwrap_or(default.end))?;
    Ok((bounds, wanted.clamp(&bounds)))
}

/// One full pass over already-loaded data: range, reshape, rank, render.
pub fn build_statement(
    config: &DashboardConfig,
    st3: &[Observation],
    st53: Option<&[OperatorSchemeObservation]>,
    req: &ViewRequest,
) -> Result<RenderedView> {
    let (_, range) = resolve_range(st3, req.start, req.end, config.default_window_months)?;
    let opts = ReshapeOptions {
        range,
        unit: req.unit,
        barrel_conversion: config.barrel_conversion,
        convert_levels: config.convert_levels,
    };
    let matrix = reshape(st3, &opts);

    // convert_levels covers ST3 inventory rows only; the breakdown always
    // follows the statement's unit
    let drill_opts = ReshapeOptions {
        convert_levels: true,
        ..opts
    };
    let drilldown = st53.map(|rows| {
        let observations: Vec<Observation> = rows
            .iter()
            .filter_map(|r| r.to_observation(config.drilldown.measure))
            .collect();
        rank_rows(reshape(&observations, &drill_opts), config.drilldown.reference)
    });
    let drill = drilldown.as_ref().map(|matrix| Drilldown {
        title: &config.drilldown.title,
        label_header: &config.drilldown.label_header,
        matrix,
    });

    let body = render_statement(&matrix, &config.template, drill.as_ref());
    let caption = format!("Showing: {} | Units: {}", range, req.unit.label());
    let html = render_page(TITLE, &caption, &body, FOOTER);
    info!(
        %range,
        unit = req.unit.label(),
        rows = matrix.rows().len(),
        months = matrix.month_count(),
        "rendered statement"
    );
    Ok(RenderedView {
        html,
        range,
        unit: req.unit,
        matrix,
        drilldown,
    })
}

/// Owns the HTTP client and the per-source caches; every render works on its
/// own reshaped copy of the shared, read-only loads.
pub struct Dashboard {
    config: DashboardConfig,
    client: Client,
    st3: DatasetCache<Vec<Observation>>,
    st53: DatasetCache<Vec<OperatorSchemeObservation>>,
}

impl Dashboard {
    pub fn new(config: DashboardConfig, client: Client) -> Result<Self> {
        config.validate()?;
        Source::parse(&config.st3_url).context("st3_url")?;
        Source::parse(&config.st53_url).context("st53_url")?;
        Ok(Self {
            config,
            client,
            st3: DatasetCache::new(),
            st53: DatasetCache::new(),
        })
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn st3_cache(&self) -> &DatasetCache<Vec<Observation>> {
        &self.st3
    }

    async fn load_source<T, F>(
        &self,
        cache: &DatasetCache<T>,
        location: &str,
        refresh: bool,
        parse: F,
    ) -> Result<Arc<T>>
    where
        F: FnOnce(&[u8]) -> Result<T>,
    {
        let source = Source::parse(location)?;
        let key = source.identity();
        if !refresh {
            if let Some(data) = cache.cached(&key)? {
                return Ok(data);
            }
        }
        let bytes = fetch_bytes(&self.client, &source).await?;
        cache
            .load(&key, &bytes, parse)
            .with_context(|| format!("loading {}", key))
    }

    pub async fn st3(&self, refresh: bool) -> Result<Arc<Vec<Observation>>> {
        let loader = self.config.st3_loader();
        self.load_source(&self.st3, &self.config.st3_url, refresh, |b| loader.parse(b))
            .await
    }

    pub async fn st53(&self, refresh: bool) -> Result<Arc<Vec<OperatorSchemeObservation>>> {
        self.load_source(
            &self.st53,
            &self.config.st53_url,
            refresh,
            load_operator_observations,
        )
        .await
    }

    #[instrument(level = "info", skip(self))]
    pub async fn render(&self, req: &ViewRequest) -> Result<RenderedView> {
        let st3 = self.st3(req.refresh).await?;
        let st53 = self.st53(req.refresh).await?;
        build_statement(&self.config, &st3, Some(&st53), req)
    }

    /// Every operator and scheme name the ST53 filters can choose from.
    pub async fn operator_options(&self, refresh: bool) -> Result<(Vec<String>, Vec<String>)> {
        let rows = self.st53(refresh).await?;
        Ok((available_operators(&rows), available_schemes(&rows)))
    }

    /// Standalone ST53 page; `filter` defaults to the first few operators.
    #[instrument(level = "info", skip(self))]
    pub async fn operators(
        &self,
        filter: Option<OperatorFilter>,
        unit: Unit,
        refresh: bool,
    ) -> Result<(OperatorView, String)> {
        let rows = self.st53(refresh).await?;
        let filter = filter.unwrap_or_else(|| OperatorFilter::default_for(&rows));
        let view = OperatorView::build(&rows, &filter, unit, self.config.barrel_conversion);
        let caption = format!("Units: {}", view.unit);
        let html = render_page(OPERATOR_TITLE, &caption, &view.render_html(), FOOTER);
        Ok((view, html))
    }
}
