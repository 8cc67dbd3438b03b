use askama::Template;
use tracing::warn;
use uuid::Uuid;

use crate::chart;
use crate::models::{Dashboard, ModuleCatalog};

pub const PLACEHOLDER: &str = "N/A";

pub fn format_stat(value: Option<f64>) -> String {
    match value {
        Some(value) if value.is_finite() => format!("{value:.2}"),
        _ => PLACEHOLDER.to_string(),
    }
}

pub struct ModuleOption<'a> {
    pub name: &'a str,
    pub selected: bool,
}

#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardPage<'a> {
    pub selection: &'a str,
    pub session: Uuid,
    // Dropdown choices, in catalog order
    pub options: Vec<ModuleOption<'a>>,
    pub notice: Option<&'a str>,
    pub mean: String,
    pub std_dev: String,
    pub chart: Option<String>,
}

impl<'a> DashboardPage<'a> {
    pub fn new(
        catalog: &'a ModuleCatalog,
        dashboard: &'a Dashboard,
        session: Uuid,
        notice: Option<&'a str>,
    ) -> Self {
        let chart = match chart::render_daily_rate(&dashboard.selection, &dashboard.daily_rate) {
            Ok(svg) => Some(svg),
            Err(err) => {
                warn!(module = %dashboard.selection, error = %err, "chart rendering failed");
                None
            }
        };

        Self {
            selection: &dashboard.selection,
            session,
            options: catalog
                .iter()
                .map(|name| ModuleOption {
                    name,
                    selected: name == dashboard.selection,
                })
                .collect(),
            notice,
            mean: format_stat(dashboard.stats.mean),
            std_dev: format_stat(dashboard.stats.std_dev),
            chart,
        }
    }
}

pub fn render_page(
    catalog: &ModuleCatalog,
    dashboard: &Dashboard,
    session: Uuid,
    notice: Option<&str>,
) -> askama::Result<String> {
    DashboardPage::new(catalog, dashboard, session, notice).render()
}
