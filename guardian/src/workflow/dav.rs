//! Sales document (DAV) creation driver.

use super::{
    choices_from, rows_or_fail, run_machine, sample_quantity, send, send_text, settle, AsyncStep,
    WorkflowContext, WorkflowReport,
};
use crate::database::{ConfigFlag, FieldLookup, Value};
use crate::errors::WorkflowError;
use crate::picker::ChoiceSet;
use crate::prober::{AuthorizationOutcome, ProbeScope};
use crate::registry::UiTarget;
use crate::UIElement;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use tracing::{info, warn};

const PRODUCT_HEADERS: [&str; 4] = ["Selecionar", "Código", "Produto", "Estoque"];
const CLEAR_FIELD: &str = "^a{DELETE}";
const OPERATOR_PROMPT: &str =
    "Leave the cursor on a delivery type and press ENTER to continue the flow";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DavState {
    SelectBranch,
    SelectOperationType,
    SelectCustomer,
    ResolveSalesRep,
    SelectPaymentMethod,
    SelectPaymentTerms,
    SelectProducts,
    LoadUnitCounts,
    FocusMainWindow,
    OpenSales,
    OpenDavInclusion,
    NewDav,
    CreditDialog,
    EnterOperationType,
    ConfirmIssueDate,
    EnterCustomer,
    CustomerDialogs,
    EnterSalesRep,
    SalesRepCreditDialog,
    EnterPaymentMethod,
    EnterPaymentTerms,
    CommissionDialog,
    ItemEntry(usize),
    ItemAuthorization(usize),
    AwaitingOperator(usize),
    ItemSave { index: usize, delivery_type: bool },
    Done,
}

/// How the operation type wants the sales rep field handled (`Nat_cfgvendedor`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SalesRepMode {
    /// 1: the default rep is accepted.
    DefaultRep,
    /// 2: the field is skipped.
    Skip,
    /// 3: a rep is chosen in the picker and typed.
    Pick,
    /// Any other value, or no value.
    Unconfigured,
}

impl SalesRepMode {
    pub fn from_flag(flag: &ConfigFlag) -> Self {
        match flag.value() {
            Some(1) => SalesRepMode::DefaultRep,
            Some(2) => SalesRepMode::Skip,
            Some(3) => SalesRepMode::Pick,
            _ => SalesRepMode::Unconfigured,
        }
    }
}

/// Whether the operation type asks for the issue date (`Nat_DatEmisPed`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueDatePrompt {
    Shown,
    Hidden,
}

impl IssueDatePrompt {
    pub fn from_flag(flag: &ConfigFlag) -> Self {
        if flag.is_enabled() {
            IssueDatePrompt::Shown
        } else {
            IssueDatePrompt::Hidden
        }
    }

    pub fn keystrokes(self) -> &'static str {
        match self {
            IssueDatePrompt::Shown => "{ENTER 3}",
            IssueDatePrompt::Hidden => "{ENTER 1}",
        }
    }
}

/// Item pricing fields offered by the branch parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemPricing {
    /// Both surcharge (`pa2_infacreped`) and discount (`pa2_infdescped`)
    /// entry are enabled; changing them may require authorization.
    DiscountAndSurcharge,
    Plain,
}

impl ItemPricing {
    pub fn from_flags(surcharge: &ConfigFlag, discount: &ConfigFlag) -> Self {
        if surcharge.is_enabled() && discount.is_enabled() {
            ItemPricing::DiscountAndSurcharge
        } else {
            ItemPricing::Plain
        }
    }
}

/// Values gathered in phase one.
#[derive(Debug, Default)]
struct DavSelections {
    branch: Option<String>,
    operation: Option<String>,
    customer: Option<String>,
    sales_rep_mode: Option<SalesRepMode>,
    sales_rep: Option<String>,
    payment_method: Option<String>,
    payment_terms: Option<String>,
    products: Vec<String>,
    stock: HashMap<String, f64>,
    unit_counts: HashMap<String, i64>,
}

fn required<'a>(value: &'a Option<String>, what: &str) -> Result<&'a str, WorkflowError> {
    value
        .as_deref()
        .ok_or_else(|| WorkflowError::NoData(format!("{what} was not collected")))
}

struct DavDriver<'a> {
    ctx: &'a WorkflowContext,
    selections: DavSelections,
    main_window: Option<UIElement>,
    dav_window: Option<UIElement>,
    rng: StdRng,
}

impl<'a> DavDriver<'a> {
    fn main_window(&self) -> Result<&UIElement, WorkflowError> {
        self.main_window
            .as_ref()
            .ok_or_else(|| WorkflowError::NoData("main window was not located".to_string()))
    }

    fn dav_window(&self) -> Result<&UIElement, WorkflowError> {
        self.dav_window
            .as_ref()
            .ok_or_else(|| WorkflowError::NoData("DAV window was not located".to_string()))
    }

    fn branch(&self) -> Option<&str> {
        self.selections.branch.as_deref()
    }

    fn next_item(&self, index: usize) -> DavState {
        if index + 1 < self.selections.products.len() {
            DavState::ItemEntry(index + 1)
        } else {
            info!("All selected items were entered successfully.");
            DavState::Done
        }
    }

    fn product(&self, index: usize) -> Result<String, WorkflowError> {
        self.selections
            .products
            .get(index)
            .cloned()
            .ok_or_else(|| WorkflowError::NoData(format!("no product at position {index}")))
    }

    async fn select_branch(&mut self) -> Result<DavState, WorkflowError> {
        let count = match self.ctx.data.active_branch_count().await {
            FieldLookup::Found(value) => value.as_i64().unwrap_or(0),
            FieldLookup::Absent => 0,
            FieldLookup::Failed(e) => {
                warn!("Could not count active branches ({}), continuing without a branch", e);
                0
            }
        };

        if count > 1 {
            info!("Multiple active branches found. Asking the user to choose one.");
            let branches = rows_or_fail(self.ctx.data.active_branches().await)?;
            let choices =
                choices_from("Seleção de Filial", &branches, "codigo_filial", "nome_filial");
            let branch = self.ctx.pick_one(&choices, "Branch").await?;
            info!("Working with branch: {}", branch);
            self.selections.branch = Some(branch);
        } else if count == 1 {
            info!("Found a single active branch: 1. Selected automatically.");
            self.selections.branch = Some("1".to_string());
        } else {
            info!("No active branch found. The branch filter will not be applied.");
        }
        Ok(DavState::SelectOperationType)
    }

    async fn select_operation_type(&mut self) -> Result<DavState, WorkflowError> {
        let table = rows_or_fail(self.ctx.data.operation_types().await)?;
        let choices = choices_from("Seleção de Natureza", &table, "codigo_natureza", "descricao");
        self.selections.operation = Some(self.ctx.pick_one(&choices, "Operation type").await?);
        Ok(DavState::SelectCustomer)
    }

    async fn select_customer(&mut self) -> Result<DavState, WorkflowError> {
        let table = rows_or_fail(self.ctx.data.customers().await)?;
        let choices =
            choices_from("Seleção de Cliente", &table, "codigo_cliente", "nome_cliente");
        self.selections.customer = Some(self.ctx.pick_one(&choices, "Customer").await?);
        Ok(DavState::ResolveSalesRep)
    }

    async fn resolve_sales_rep(&mut self) -> Result<DavState, WorkflowError> {
        let operation = required(&self.selections.operation, "operation type")?;
        let flag = self
            .ctx
            .data
            .operation_flag("Nat_cfgvendedor", operation)
            .await;
        let mode = SalesRepMode::from_flag(&flag);
        info!("Sales rep handling for operation {}: {:?}", operation, mode);

        if mode == SalesRepMode::Pick {
            let table = rows_or_fail(self.ctx.data.sales_reps().await)?;
            let choices =
                choices_from("Seleção de Vendedor", &table, "codigo_colaborador", "nome_vendedor");
            self.selections.sales_rep = Some(self.ctx.pick_one(&choices, "Sales rep").await?);
        }
        self.selections.sales_rep_mode = Some(mode);
        Ok(DavState::SelectPaymentMethod)
    }

    async fn select_payment_method(&mut self) -> Result<DavState, WorkflowError> {
        let customer = required(&self.selections.customer, "customer")?.to_string();
        let mut table = rows_or_fail(self.ctx.data.payment_methods(&customer).await)?;
        if table.is_empty() {
            info!(
                "Customer {} has no specific payment methods, offering all active ones",
                customer
            );
            table = rows_or_fail(self.ctx.data.all_payment_methods().await)?;
        }
        let choices = choices_from(
            "Seleção de Forma de Pagamento",
            &table,
            "codigo_forma",
            "descricao",
        );
        self.selections.payment_method = Some(self.ctx.pick_one(&choices, "Payment method").await?);
        Ok(DavState::SelectPaymentTerms)
    }

    async fn select_payment_terms(&mut self) -> Result<DavState, WorkflowError> {
        let customer = required(&self.selections.customer, "customer")?.to_string();
        let method = required(&self.selections.payment_method, "payment method")?.to_string();
        let mut table = rows_or_fail(self.ctx.data.payment_terms(&customer, &method).await)?;
        if table.is_empty() {
            info!(
                "Customer {} has no specific payment terms for method {}, offering all compatible ones",
                customer, method
            );
            table = rows_or_fail(self.ctx.data.all_payment_terms(&method).await)?;
        }
        let choices = choices_from(
            "Seleção de Condição de Pagamento",
            &table,
            "codigo_condicao",
            "descricao",
        );
        self.selections.payment_terms = Some(self.ctx.pick_one(&choices, "Payment terms").await?);
        Ok(DavState::SelectProducts)
    }

    async fn select_products(&mut self) -> Result<DavState, WorkflowError> {
        let branch = self.branch().map(str::to_string);
        let table = rows_or_fail(self.ctx.data.available_products(branch.as_deref()).await)?;

        let mut choices =
            ChoiceSet::new("Seleção de Produtos para Lançamento").with_headers(PRODUCT_HEADERS);
        for row in table.rows() {
            let Some(code) = row.text("codigo_produto") else {
                continue;
            };
            let name = row.text("nome_produto").unwrap_or_default();
            let stock = row.get("estoquedisponivel").and_then(Value::as_f64);
            if let Some(stock) = stock {
                self.selections.stock.insert(code.clone(), stock);
            }
            let stock_cell = stock.map(|s| s.to_string()).unwrap_or_default();
            choices.push(
                code.clone(),
                format!("{code} - {name}"),
                vec![code, name, stock_cell],
            );
        }

        let selected = self.ctx.pick_many(&choices, "Product").await?;
        self.selections.products = selected.into_iter().map(|c| c.trim().to_string()).collect();
        info!("Products selected: {:?}", self.selections.products);
        Ok(DavState::LoadUnitCounts)
    }

    async fn load_unit_counts(&mut self) -> Result<DavState, WorkflowError> {
        let table = rows_or_fail(
            self.ctx
                .data
                .product_unit_counts(&self.selections.products)
                .await,
        )?;
        for row in table.rows() {
            let code = row.get_index(0).map(|v| v.to_string().trim().to_string());
            let count = row.get_index(1).and_then(Value::as_i64);
            if let (Some(code), Some(count)) = (code, count) {
                self.selections.unit_counts.insert(code, count);
            }
        }

        info!("--- PHASE 1 COMPLETE: all data has been collected. ---");
        info!(
            "UI automation will start in {:?}...",
            self.ctx.timings.phase_two_delay()
        );
        settle(self.ctx.timings.phase_two_delay()).await;
        Ok(DavState::FocusMainWindow)
    }

    async fn focus_main_window(&mut self) -> Result<DavState, WorkflowError> {
        info!("--- PHASE 2: starting Guardian UI automation ---");
        let main = self
            .ctx
            .find_window(UiTarget::MainWindow, None, self.ctx.timings.main_window())
            .await?;
        info!("Guardian main window found and ready for automation.");
        main.focus()?;
        self.main_window = Some(main);
        Ok(DavState::OpenSales)
    }

    async fn open_dav_window(&mut self) -> Result<DavState, WorkflowError> {
        info!("Looking for the DAV inclusion child window...");
        let main = self.main_window()?.clone();
        let dav = self
            .ctx
            .find_window(
                UiTarget::DavInclusionWindow,
                Some(&main),
                self.ctx.timings.dav_window(),
            )
            .await?;
        dav.focus()?;
        info!("DAV inclusion window found. Pressing F2...");
        send(&dav, "{F2}")?;
        self.dav_window = Some(dav);
        Ok(DavState::CreditDialog)
    }

    fn enter_sales_rep(&self) -> Result<DavState, WorkflowError> {
        let dav = self.dav_window()?;
        let mode = self
            .selections
            .sales_rep_mode
            .unwrap_or(SalesRepMode::Unconfigured);
        match mode {
            SalesRepMode::DefaultRep => {
                info!("Sales rep mode 1: accepting the default rep.");
                send(dav, "{ENTER 2}")?;
            }
            SalesRepMode::Skip => {
                info!("Sales rep mode 2: skipping the sales rep field.");
                send(dav, "{ENTER}")?;
            }
            SalesRepMode::Pick => {
                let rep = required(&self.selections.sales_rep, "sales rep")?;
                send(dav, CLEAR_FIELD)?;
                send_text(dav, rep)?;
                send(dav, "{ENTER 2}")?;
                info!("Sales rep '{}' entered.", rep);
            }
            SalesRepMode::Unconfigured => send(dav, "{ENTER}")?,
        }
        Ok(DavState::SalesRepCreditDialog)
    }

    async fn item_entry(&mut self, index: usize) -> Result<DavState, WorkflowError> {
        let dav = self.dav_window()?.clone();
        let product = self.product(index)?;
        let settle_time = self.ctx.timings.short_settle();
        info!("Entering product: {}", product);
        send_text(&dav, &product)?;

        let last_price = self
            .ctx
            .data
            .branch_flag("parametro2", "pa2_vultpreco", self.branch())
            .await;
        if last_price.is_enabled() {
            self.ctx
                .prober
                .probe(UiTarget::LastPricePracticed, "{ENTER}", ProbeScope::Desktop)
                .await;
        }

        // One ENTER picks the only unit; products sold in several units need a second.
        let units = match self.selections.unit_counts.get(&product) {
            Some(units) => *units,
            None => {
                warn!("No active unit count for product {}, assuming one unit", product);
                1
            }
        };
        info!("Product has {} mapped unit(s).", units);
        let unit_enters = if units > 1 { 2 } else { 1 };
        dav.focus()?;
        for _ in 0..unit_enters {
            settle(settle_time).await;
            send(&dav, "{ENTER}")?;
        }

        let operation = required(&self.selections.operation, "operation type")?;
        let lot_location = self
            .ctx
            .data
            .operation_flag("Nat_LcLtPeds", operation)
            .await;
        if lot_location.is_enabled() {
            dav.focus()?;
            settle(settle_time).await;
            send(&dav, "{ENTER}")?;
        }

        let stock = self.selections.stock.get(&product).copied();
        let sampled = sample_quantity(&mut self.rng, &product, stock);
        dav.focus()?;
        send_text(&dav, &sampled.quantity.to_string())?;
        settle(settle_time).await;

        let surcharge = self
            .ctx
            .data
            .branch_flag("parametro2", "pa2_infacreped", self.branch())
            .await;
        let discount = self
            .ctx
            .data
            .branch_flag("parametro2", "pa2_infdescped", self.branch())
            .await;
        Ok(match ItemPricing::from_flags(&surcharge, &discount) {
            ItemPricing::DiscountAndSurcharge => DavState::ItemAuthorization(index),
            ItemPricing::Plain => DavState::ItemSave {
                index,
                delivery_type: false,
            },
        })
    }

    async fn item_authorization(&mut self, index: usize) -> Result<DavState, WorkflowError> {
        let dav = self.dav_window()?.clone();
        let main = self.main_window()?.clone();
        let settle_time = self.ctx.timings.long_settle();

        dav.focus()?;
        settle(settle_time).await;
        send(&dav, "{ENTER}")?;

        match self.ctx.prober.probe_authorization(&main).await {
            AuthorizationOutcome::Authorized => info!("Item {} authorized.", index + 1),
            AuthorizationOutcome::Absent => {}
            AuthorizationOutcome::Failed => {
                warn!("Authorization for item {} could not be completed", index + 1)
            }
        }
        settle(settle_time).await;
        send(&dav, "{ENTER 5}")?;

        let delivery_type = self
            .ctx
            .data
            .branch_flag("parametro4", "pa4_tipoentit", self.branch())
            .await;
        if delivery_type.is_enabled() {
            settle(settle_time).await;
            send(&dav, "{F1}")?;
            Ok(DavState::AwaitingOperator(index))
        } else {
            Ok(DavState::ItemSave {
                index,
                delivery_type: false,
            })
        }
    }

    async fn item_save(
        &mut self,
        index: usize,
        delivery_type: bool,
    ) -> Result<DavState, WorkflowError> {
        let dav = self.dav_window()?.clone();
        dav.focus()?;
        if delivery_type {
            info!("Pressing ENTER 2x to save the item.");
            send(&dav, "{ENTER 2}")?;
            // Guardian warns that the delivery type of the order changes.
            self.ctx
                .prober
                .probe(UiTarget::AttentionDialog, "{ENTER}", ProbeScope::Desktop)
                .await;
        } else {
            info!("Pressing ENTER 3x to save the item.");
            send(&dav, "{ENTER 3}")?;
        }
        Ok(self.next_item(index))
    }
}

#[async_trait]
impl<'a> AsyncStep<DavState> for DavDriver<'a> {
    async fn step(&mut self, state: &DavState) -> Result<DavState, WorkflowError> {
        match state {
            DavState::SelectBranch => self.select_branch().await,
            DavState::SelectOperationType => self.select_operation_type().await,
            DavState::SelectCustomer => self.select_customer().await,
            DavState::ResolveSalesRep => self.resolve_sales_rep().await,
            DavState::SelectPaymentMethod => self.select_payment_method().await,
            DavState::SelectPaymentTerms => self.select_payment_terms().await,
            DavState::SelectProducts => self.select_products().await,
            DavState::LoadUnitCounts => self.load_unit_counts().await,
            DavState::FocusMainWindow => self.focus_main_window().await,
            DavState::OpenSales => {
                send(self.main_window()?, "%V")?;
                info!("Navigated to the sales section.");
                Ok(DavState::OpenDavInclusion)
            }
            DavState::OpenDavInclusion => {
                send(self.main_window()?, "{ENTER}")?;
                info!("DAV inclusion screen opened.");
                Ok(DavState::NewDav)
            }
            DavState::NewDav => self.open_dav_window().await,
            DavState::CreditDialog => {
                self.ctx
                    .prober
                    .probe(UiTarget::ConfirmationDialog, "%n", ProbeScope::Desktop)
                    .await;
                Ok(DavState::EnterOperationType)
            }
            DavState::EnterOperationType => {
                let dav = self.dav_window()?;
                let operation = required(&self.selections.operation, "operation type")?;
                send(dav, CLEAR_FIELD)?;
                send_text(dav, operation)?;
                info!("Operation type '{}' entered.", operation);
                Ok(DavState::ConfirmIssueDate)
            }
            DavState::ConfirmIssueDate => {
                let operation = required(&self.selections.operation, "operation type")?;
                let flag = self
                    .ctx
                    .data
                    .operation_flag("Nat_DatEmisPed", operation)
                    .await;
                let prompt = IssueDatePrompt::from_flag(&flag);
                info!("Issue date prompt {:?}, sending {}", prompt, prompt.keystrokes());
                send(self.dav_window()?, prompt.keystrokes())?;
                Ok(DavState::EnterCustomer)
            }
            DavState::EnterCustomer => {
                let dav = self.dav_window()?;
                let customer = required(&self.selections.customer, "customer")?;
                send(dav, CLEAR_FIELD)?;
                send_text(dav, customer)?;
                send(dav, "{ENTER}")?;
                info!("Customer '{}' entered.", customer);
                Ok(DavState::CustomerDialogs)
            }
            DavState::CustomerDialogs => {
                let main = self.main_window()?.clone();
                let prober = &self.ctx.prober;
                prober
                    .probe(UiTarget::WarningDialog, "{ENTER}", ProbeScope::Desktop)
                    .await;
                prober
                    .probe(UiTarget::NotificationDialog, "{ENTER}", ProbeScope::Desktop)
                    .await;
                prober
                    .probe(
                        UiTarget::AddressDialog,
                        "{TAB}{TAB}{TAB}{ENTER}",
                        ProbeScope::Within(main),
                    )
                    .await;
                Ok(DavState::EnterSalesRep)
            }
            DavState::EnterSalesRep => self.enter_sales_rep(),
            DavState::SalesRepCreditDialog => {
                self.ctx
                    .prober
                    .probe(UiTarget::ConfirmationDialog, "%n", ProbeScope::Desktop)
                    .await;
                Ok(DavState::EnterPaymentMethod)
            }
            DavState::EnterPaymentMethod => {
                let dav = self.dav_window()?;
                let method = required(&self.selections.payment_method, "payment method")?;
                send(dav, "{ENTER}")?;
                send(dav, CLEAR_FIELD)?;
                send_text(dav, method)?;
                send(dav, "{ENTER}")?;
                info!("Payment method '{}' entered.", method);
                Ok(DavState::EnterPaymentTerms)
            }
            DavState::EnterPaymentTerms => {
                let dav = self.dav_window()?.clone();
                let terms = required(&self.selections.payment_terms, "payment terms")?;
                send(&dav, CLEAR_FIELD)?;
                send_text(&dav, terms)?;
                info!("Payment terms '{}' entered. Pressing ENTER 5x to reach the items.", terms);
                send(&dav, "{ENTER 5}")?;
                settle(self.ctx.timings.long_settle()).await;
                Ok(DavState::CommissionDialog)
            }
            DavState::CommissionDialog => {
                let commission = self
                    .ctx
                    .data
                    .branch_flag("parametro5", "pa5_digcomisDav", self.branch())
                    .await;
                if commission.is_enabled() {
                    self.ctx
                        .prober
                        .probe(UiTarget::ConfirmationDialog, "%(s)", ProbeScope::Desktop)
                        .await;
                } else {
                    info!("Commission entry on the DAV is disabled, moving on.");
                }
                info!("Starting item entry...");
                Ok(if self.selections.products.is_empty() {
                    DavState::Done
                } else {
                    DavState::ItemEntry(0)
                })
            }
            DavState::ItemEntry(index) => self.item_entry(*index).await,
            DavState::ItemAuthorization(index) => self.item_authorization(*index).await,
            DavState::AwaitingOperator(index) => {
                self.ctx.operator.await_operator(OPERATOR_PROMPT).await?;
                Ok(DavState::ItemSave {
                    index: *index,
                    delivery_type: true,
                })
            }
            DavState::ItemSave {
                index,
                delivery_type,
            } => self.item_save(*index, *delivery_type).await,
            DavState::Done => Ok(DavState::Done),
        }
    }
}

/// Runs the DAV creation workflow from branch selection to the last item.
pub async fn run_dav(ctx: &WorkflowContext) -> WorkflowReport<DavState> {
    run_dav_with_rng(ctx, StdRng::from_entropy()).await
}

/// As [`run_dav`], drawing item quantities from `rng`.
pub async fn run_dav_with_rng(ctx: &WorkflowContext, rng: StdRng) -> WorkflowReport<DavState> {
    info!("### STARTING: Sales document (DAV) creation ###");
    info!("--- PHASE 1: collecting all required information ---");
    let driver = DavDriver {
        ctx,
        selections: DavSelections::default(),
        main_window: None,
        dav_window: None,
        rng,
    };
    let report = run_machine("DAV creation", DavState::SelectBranch, DavState::Done, driver).await;
    if report.is_success() {
        info!("### COMPLETED: DAV creation ###");
    }
    report
}
