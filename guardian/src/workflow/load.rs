//! Load assembly driver: bundles today's sales orders into a logistics load.

use super::{run_machine, send, settle, AsyncStep, WorkflowContext, WorkflowReport};
use crate::errors::WorkflowError;
use crate::keys::KeySequence;
use crate::picker::ChoiceSet;
use crate::registry::UiTarget;
use crate::UIElement;
use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use tracing::{info, warn};

const ORDER_HEADERS: [&str; 3] = ["Selecionar", "Pedido", "Série"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    FetchOrders,
    SelectOrders,
    OpenLogistics,
    StartLoad,
    EnterOrder(usize),
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SalesOrder {
    number: String,
    series: String,
}

impl SalesOrder {
    /// Picker code; number and series together identify one order.
    fn code(&self) -> String {
        format!("{}-{}", self.number, self.series)
    }
}

/// Keystrokes that add one order to the load grid.
///
/// The first row takes the order number before the series; Guardian keeps
/// the cursor on the series column afterwards, so later rows are typed
/// series first. Every row but the last ends with four ENTERs to open the
/// next grid line.
pub fn order_keystrokes(index: usize, total: usize, number: &str, series: &str) -> KeySequence {
    let (first, second) = if index == 0 {
        (number, series)
    } else {
        (series, number)
    };
    let keys = KeySequence::text(first)
        .then(KeySequence::enter(1))
        .then(KeySequence::text(second));
    if index + 1 < total {
        keys.then(KeySequence::enter(4))
    } else {
        keys
    }
}

struct LoadDriver<'a> {
    ctx: &'a WorkflowContext,
    issued_on: NaiveDate,
    available: Vec<SalesOrder>,
    selected: Vec<SalesOrder>,
    main_window: Option<UIElement>,
    logistics_window: Option<UIElement>,
}

impl<'a> LoadDriver<'a> {
    async fn fetch_orders(&mut self) -> Result<LoadState, WorkflowError> {
        info!("Fetching sales orders issued on {}...", self.issued_on);
        let table = self.ctx.data.sales_orders(self.issued_on).await.into_result()?;
        self.available = table
            .rows()
            .iter()
            .filter_map(|row| {
                Some(SalesOrder {
                    number: row.text("pedido")?,
                    series: row.text("serie")?,
                })
            })
            .collect();

        if self.available.is_empty() {
            warn!("No sales orders found for today. Nothing to load.");
            return Ok(LoadState::Done);
        }
        Ok(LoadState::SelectOrders)
    }

    async fn select_orders(&mut self) -> Result<LoadState, WorkflowError> {
        let mut choices =
            ChoiceSet::new("Seleção de Pedidos para Carga").with_headers(ORDER_HEADERS);
        for order in &self.available {
            choices.push(
                order.code(),
                format!("{} / {}", order.number, order.series),
                vec![order.number.clone(), order.series.clone()],
            );
        }

        let codes = self.ctx.pick_many(&choices, "Sales order").await?;
        self.selected = self
            .available
            .iter()
            .filter(|order| codes.contains(&order.code()))
            .cloned()
            .collect();
        if self.selected.is_empty() {
            return Err(WorkflowError::Cancelled("Sales order".to_string()));
        }
        info!("User selected {} orders.", self.selected.len());
        Ok(LoadState::OpenLogistics)
    }

    async fn open_logistics(&mut self) -> Result<LoadState, WorkflowError> {
        info!("--- PHASE 2: UI automation ---");
        let main = self
            .ctx
            .find_window(UiTarget::MainWindow, None, self.ctx.timings.main_window())
            .await?;
        main.focus()?;
        info!("Guardian main window found.");
        send(&main, "%l")?;
        send(&main, "{ENTER}")?;
        info!("Step 1: navigated to the logistics screen.");
        settle(self.ctx.timings.logistics_open_delay()).await;
        self.main_window = Some(main);
        Ok(LoadState::StartLoad)
    }

    async fn start_load(&mut self) -> Result<LoadState, WorkflowError> {
        let main = self
            .main_window
            .clone()
            .ok_or_else(|| WorkflowError::NoData("main window was not located".to_string()))?;
        let logistics = self
            .ctx
            .find_window(
                UiTarget::LogisticsWindow,
                Some(&main),
                self.ctx.timings.logistics_window(),
            )
            .await?;
        let step_delay = self.ctx.timings.logistics_step_delay();

        send(&logistics, "{F2}")?;
        info!("Step 2: new load started.");
        settle(step_delay).await;
        send(&logistics, "{ENTER 2}")?;
        info!("Step 3: pressed ENTER 2x.");
        settle(step_delay).await;

        info!("Step 4: entering the selected orders...");
        self.logistics_window = Some(logistics);
        Ok(LoadState::EnterOrder(0))
    }

    async fn enter_order(&mut self, index: usize) -> Result<LoadState, WorkflowError> {
        let logistics = self
            .logistics_window
            .as_ref()
            .ok_or_else(|| WorkflowError::NoData("logistics window was not located".to_string()))?;
        let order = self
            .selected
            .get(index)
            .ok_or_else(|| WorkflowError::NoData(format!("no order at position {index}")))?;
        let total = self.selected.len();

        info!("  -> Adding order {}, series {}", order.number, order.series);
        logistics.send_keys(&order_keystrokes(index, total, &order.number, &order.series))?;

        if index + 1 < total {
            settle(self.ctx.timings.long_settle()).await;
            Ok(LoadState::EnterOrder(index + 1))
        } else {
            info!("All orders were added to the load.");
            settle(self.ctx.timings.post_load_pause()).await;
            Ok(LoadState::Done)
        }
    }
}

#[async_trait]
impl<'a> AsyncStep<LoadState> for LoadDriver<'a> {
    async fn step(&mut self, state: &LoadState) -> Result<LoadState, WorkflowError> {
        match state {
            LoadState::FetchOrders => self.fetch_orders().await,
            LoadState::SelectOrders => self.select_orders().await,
            LoadState::OpenLogistics => self.open_logistics().await,
            LoadState::StartLoad => self.start_load().await,
            LoadState::EnterOrder(index) => self.enter_order(*index).await,
            LoadState::Done => Ok(LoadState::Done),
        }
    }
}

/// Runs load assembly over the orders issued today.
pub async fn run_load(ctx: &WorkflowContext) -> WorkflowReport<LoadState> {
    run_load_for(ctx, Local::now().date_naive()).await
}

/// Runs load assembly over the orders issued on `issued_on`.
pub async fn run_load_for(
    ctx: &WorkflowContext,
    issued_on: NaiveDate,
) -> WorkflowReport<LoadState> {
    info!("### STARTING: Load assembly ###");
    let driver = LoadDriver {
        ctx,
        issued_on,
        available: Vec::new(),
        selected: Vec::new(),
        main_window: None,
        logistics_window: None,
    };
    let report = run_machine(
        "load assembly",
        LoadState::FetchOrders,
        LoadState::Done,
        driver,
    )
    .await;
    if report.is_success() {
        info!("### COMPLETED: Load assembly ###");
    }
    report
}
