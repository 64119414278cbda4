//! Scripted stand-ins for the desktop, the database, the picker and the operator.

use crate::database::{FieldLookup, QueryOutcome, ReferenceData, Table, Value};
use crate::element::{UIElementAttributes, UIElementImpl};
use crate::errors::{AutomationError, GatewayError, PickerError, WorkflowError};
use crate::keys::KeySequence;
use crate::picker::{ChoiceSet, Picker, Selection};
use crate::platforms::{AccessibilityEngine, Backend};
use crate::workflow::{OperatorInput, WorkflowContext};
use crate::{Desktop, Selector, SelectorRegistry, Timings, UIElement};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub const MAIN: &str = "Space Guardian - Filial 1";
pub const DAV: &str = "Inclusão de DAV";
pub const LOGISTICS: &str = "Logística";

pub const SELECTORS: &str = r##"{
    "main_window": {"title_re": "Space Guardian.*"},
    "dav_inclusion_window": {"title": "Inclusão de DAV"},
    "confirmation_dialog": {"title": "Confirmação"},
    "warning_dialog": {"title": "Aviso"},
    "notification_dialog": {"title": "Notificação"},
    "adress_dialog": {"title": "Endereço de Entrega"},
    "last_price_pratice": {"title": "Último Preço Praticado"},
    "atention_dialog": {"title": "Atenção"},
    "authorization_dialog": {"title_re": "Autoriza.*", "class_name": "TFrmAutoriza"},
    "authorization_authorize_button": {"title": "<< Autorizar", "control_type": "Button"},
    "authorization_confirm_button": {"title": "Confirmar", "control_type": "Button"},
    "logistics_window": {"title": "Logística"}
}"##;

/// Rendering of a keystroke macro as the fake elements log it.
pub fn keys(spec: &str) -> String {
    KeySequence::parse(spec).unwrap().to_string()
}

/// Everything the fakes did, in order, shared between them.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn position(&self, event: &str) -> Option<usize> {
        self.events().iter().position(|e| e == event)
    }

    pub fn count(&self, event: &str) -> usize {
        self.events().iter().filter(|e| *e == event).count()
    }

    pub fn contains(&self, event: &str) -> bool {
        self.position(event).is_some()
    }
}

#[derive(Debug, Clone)]
struct FakeWindow {
    attrs: UIElementAttributes,
    parent: Option<usize>,
    /// Lookups that miss the window before it shows up.
    appear_after: u32,
    fail_focus: bool,
}

#[derive(Debug, Default)]
struct Scene {
    windows: Vec<FakeWindow>,
    lookups: HashMap<usize, u32>,
}

/// One `find_element` call: the backend, the selector and the scoping window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Search {
    pub backend: Backend,
    pub selector: String,
    pub root: Option<String>,
}

/// Engine over a scripted window tree.
///
/// The win32 view only exposes titles and classes, so selectors that need a
/// control type or automation id match nothing through it.
pub struct ScriptedEngine {
    scene: Mutex<Scene>,
    searches: Mutex<Vec<Search>>,
    log: EventLog,
}

impl ScriptedEngine {
    pub fn new(log: EventLog) -> Self {
        Self {
            scene: Mutex::new(Scene::default()),
            searches: Mutex::new(Vec::new()),
            log,
        }
    }

    pub fn add(
        &self,
        parent: Option<usize>,
        title: &str,
        class_name: &str,
        control_type: &str,
    ) -> usize {
        let mut scene = self.scene.lock().unwrap();
        scene.windows.push(FakeWindow {
            attrs: UIElementAttributes {
                name: Some(title.to_string()),
                class_name: Some(class_name.to_string()),
                control_type: Some(control_type.to_string()),
                automation_id: None,
                is_visible: true,
            },
            parent,
            appear_after: 0,
            fail_focus: false,
        });
        scene.windows.len() - 1
    }

    pub fn window(&self, title: &str) -> usize {
        self.add(None, title, "TForm", "Window")
    }

    pub fn child(&self, parent: usize, title: &str) -> usize {
        self.add(Some(parent), title, "TForm", "Window")
    }

    pub fn appear_after(&self, id: usize, lookups: u32) {
        self.scene.lock().unwrap().windows[id].appear_after = lookups;
    }

    pub fn fail_focus(&self, id: usize) {
        self.scene.lock().unwrap().windows[id].fail_focus = true;
    }

    pub fn lookups(&self, id: usize) -> u32 {
        self.scene
            .lock()
            .unwrap()
            .lookups
            .get(&id)
            .copied()
            .unwrap_or(0)
    }

    pub fn searches(&self) -> Vec<Search> {
        self.searches.lock().unwrap().clone()
    }

    pub fn searches_with(&self, backend: Backend) -> Vec<Search> {
        self.searches()
            .into_iter()
            .filter(|s| s.backend == backend)
            .collect()
    }

    fn element(&self, id: usize, window: &FakeWindow) -> UIElement {
        UIElement::new(Arc::new(FakeElement {
            id,
            attrs: window.attrs.clone(),
            fail_focus: window.fail_focus,
            log: self.log.clone(),
        }))
    }

    fn is_under(scene: &Scene, id: usize, ancestor: Option<usize>) -> bool {
        let parent = scene.windows[id].parent;
        match ancestor {
            None => parent.is_none(),
            Some(ancestor) => {
                let mut current = parent;
                while let Some(p) = current {
                    if p == ancestor {
                        return true;
                    }
                    current = scene.windows[p].parent;
                }
                false
            }
        }
    }

    fn visible_attributes(window: &FakeWindow, backend: Backend) -> UIElementAttributes {
        match backend {
            Backend::Uia => window.attrs.clone(),
            Backend::Win32 => UIElementAttributes {
                control_type: None,
                automation_id: None,
                ..window.attrs.clone()
            },
        }
    }

    fn try_find(
        &self,
        selector: &Selector,
        root: Option<usize>,
        backend: Backend,
    ) -> Option<UIElement> {
        let mut guard = self.scene.lock().unwrap();
        let scene = &mut *guard;
        let candidates: Vec<usize> = (0..scene.windows.len())
            .filter(|&id| Self::is_under(scene, id, root))
            .filter(|&id| {
                selector.matches(&Self::visible_attributes(&scene.windows[id], backend))
            })
            .collect();
        for id in candidates {
            let seen = scene.lookups.entry(id).or_insert(0);
            *seen += 1;
            if *seen > scene.windows[id].appear_after {
                let window = scene.windows[id].clone();
                return Some(self.element(id, &window));
            }
        }
        None
    }
}

impl AccessibilityEngine for ScriptedEngine {
    fn find_element(
        &self,
        selector: &Selector,
        root: Option<&UIElement>,
        timeout: Duration,
        backend: Backend,
    ) -> Result<UIElement, AutomationError> {
        let root = root.and_then(|r| r.as_any().downcast_ref::<FakeElement>());
        self.searches.lock().unwrap().push(Search {
            backend,
            selector: selector.to_string(),
            root: root.map(|r| r.label().to_string()),
        });
        let root = root.map(|r| r.id);
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(found) = self.try_find(selector, root, backend) {
                return Ok(found);
            }
            if Instant::now() >= deadline {
                return Err(AutomationError::ElementNotFound(selector.to_string()));
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[derive(Debug)]
struct FakeElement {
    id: usize,
    attrs: UIElementAttributes,
    fail_focus: bool,
    log: EventLog,
}

impl FakeElement {
    fn label(&self) -> &str {
        self.attrs.name.as_deref().unwrap_or_default()
    }
}

impl UIElementImpl for FakeElement {
    fn attributes(&self) -> UIElementAttributes {
        self.attrs.clone()
    }

    fn is_visible(&self) -> Result<bool, AutomationError> {
        Ok(true)
    }

    fn focus(&self) -> Result<(), AutomationError> {
        if self.fail_focus {
            return Err(AutomationError::PlatformError(format!(
                "cannot focus {}",
                self.label()
            )));
        }
        self.log.push(format!("focus {}", self.label()));
        Ok(())
    }

    fn send_keys(&self, keys: &KeySequence) -> Result<(), AutomationError> {
        self.log.push(format!("{}: {}", self.label(), keys));
        Ok(())
    }

    fn invoke(&self) -> Result<(), AutomationError> {
        self.log.push(format!("invoke {}", self.label()));
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// Table, field and optional `(column, value)` condition of a flag lookup.
type FlagKey = (String, String, Option<(String, String)>);

fn flag_key(table: &str, field: &str, condition: Option<(&str, &str)>) -> FlagKey {
    (
        table.to_string(),
        field.to_string(),
        condition.map(|(column, value)| (column.to_string(), value.to_string())),
    )
}

/// Reference data served from in-memory tables.
pub struct FakeData {
    pub branch_count: i64,
    tables: HashMap<&'static str, Result<Table, String>>,
    flags: HashMap<FlagKey, i64>,
    branch_columns: HashMap<String, String>,
    calls: Mutex<Vec<String>>,
}

impl Default for FakeData {
    fn default() -> Self {
        let mut tables = HashMap::new();
        let two = |a: &str, b: &str, rows: Vec<Vec<Value>>| -> Result<Table, String> {
            Ok(Table::new(&[a, b], rows))
        };
        tables.insert(
            "branches",
            two("codigo_filial", "nome_filial", vec![vec![Value::Int(1), "Matriz".into()]]),
        );
        tables.insert(
            "operation_types",
            two("codigo_natureza", "descricao", vec![vec!["VEN".into(), "Venda".into()]]),
        );
        tables.insert(
            "customers",
            two(
                "codigo_cliente",
                "nome_cliente",
                vec![vec![Value::Int(42), "Cliente Teste".into()]],
            ),
        );
        tables.insert(
            "sales_reps",
            two(
                "codigo_colaborador",
                "nome_vendedor",
                vec![vec![Value::Int(7), "Vendedor".into()]],
            ),
        );
        tables.insert(
            "payment_methods",
            two("codigo_forma", "descricao", vec![vec!["1".into(), "Dinheiro".into()]]),
        );
        tables.insert(
            "all_payment_methods",
            two("codigo_forma", "descricao", vec![vec!["2".into(), "Boleto".into()]]),
        );
        tables.insert(
            "payment_terms",
            two("codigo_condicao", "descricao", vec![vec!["10".into(), "A vista".into()]]),
        );
        tables.insert(
            "all_payment_terms",
            two("codigo_condicao", "descricao", vec![vec!["11".into(), "30 dias".into()]]),
        );
        tables.insert(
            "products",
            Ok(Table::new(
                &["codigo_produto", "nome_produto", "EstoqueDisponivel"],
                vec![vec!["P1".into(), "Produto 1".into(), Value::Float(5.0)]],
            )),
        );
        tables.insert(
            "unit_counts",
            two("codigo_produto", "total_unidades_ativas", vec![vec!["P1".into(), Value::Int(1)]]),
        );
        tables.insert(
            "sales_orders",
            two(
                "pedido",
                "serie",
                vec![vec![Value::Int(1001), "1".into()], vec![Value::Int(1002), "1".into()]],
            ),
        );
        Self {
            branch_count: 1,
            tables,
            flags: HashMap::new(),
            branch_columns: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl FakeData {
    /// Flag read without a condition, as unscoped parameter tables are.
    pub fn with_flag(mut self, table: &str, field: &str, value: i64) -> Self {
        self.flags.insert(flag_key(table, field, None), value);
        self
    }

    /// Flag stored on the row where `column = key`.
    pub fn with_flag_where(
        mut self,
        table: &str,
        field: &str,
        (column, key): (&str, &str),
        value: i64,
    ) -> Self {
        self.flags
            .insert(flag_key(table, field, Some((column, key))), value);
        self
    }

    pub fn with_operation_flag(self, field: &str, operation: &str, value: i64) -> Self {
        self.with_flag_where("natoper", field, ("Nat_Codigo", operation), value)
    }

    pub fn with_branch_column(mut self, table: &str, column: &str) -> Self {
        self.branch_columns
            .insert(table.to_string(), column.to_string());
        self
    }

    pub fn with_table(
        mut self,
        name: &'static str,
        columns: &[&str],
        rows: Vec<Vec<Value>>,
    ) -> Self {
        self.tables.insert(name, Ok(Table::new(columns, rows)));
        self
    }

    pub fn with_empty(mut self, name: &'static str) -> Self {
        self.tables.insert(name, Ok(Table::default()));
        self
    }

    pub fn with_failure(mut self, name: &'static str) -> Self {
        self.tables.insert(name, Err("connection reset".to_string()));
        self
    }

    pub fn called(&self, name: &str) -> bool {
        self.calls.lock().unwrap().iter().any(|c| c == name)
    }

    fn table(&self, name: &'static str) -> QueryOutcome {
        self.calls.lock().unwrap().push(name.to_string());
        match self.tables.get(name) {
            Some(Ok(table)) => QueryOutcome::from_table(table.clone()),
            Some(Err(message)) => QueryOutcome::Failed(GatewayError::Decode {
                column: name.to_string(),
                message: message.clone(),
            }),
            None => QueryOutcome::Empty,
        }
    }
}

#[async_trait]
impl ReferenceData for FakeData {
    async fn app_version(&self) -> FieldLookup {
        FieldLookup::Found(Value::from("2.52.1"))
    }

    async fn active_branch_count(&self) -> FieldLookup {
        FieldLookup::Found(Value::Int(self.branch_count))
    }

    async fn active_branches(&self) -> QueryOutcome {
        self.table("branches")
    }

    async fn operation_types(&self) -> QueryOutcome {
        self.table("operation_types")
    }

    async fn customers(&self) -> QueryOutcome {
        self.table("customers")
    }

    async fn sales_reps(&self) -> QueryOutcome {
        self.table("sales_reps")
    }

    async fn payment_methods(&self, _customer: &str) -> QueryOutcome {
        self.table("payment_methods")
    }

    async fn all_payment_methods(&self) -> QueryOutcome {
        self.table("all_payment_methods")
    }

    async fn payment_terms(&self, _customer: &str, _method: &str) -> QueryOutcome {
        self.table("payment_terms")
    }

    async fn all_payment_terms(&self, _method: &str) -> QueryOutcome {
        self.table("all_payment_terms")
    }

    async fn available_products(&self, _branch: Option<&str>) -> QueryOutcome {
        self.table("products")
    }

    async fn product_unit_counts(&self, _products: &[String]) -> QueryOutcome {
        self.table("unit_counts")
    }

    async fn sales_orders(&self, _issued_on: NaiveDate) -> QueryOutcome {
        self.table("sales_orders")
    }

    async fn lookup_field(
        &self,
        table: &str,
        field: &str,
        condition: Option<(&str, &str)>,
    ) -> FieldLookup {
        match self.flags.get(&flag_key(table, field, condition)) {
            Some(value) => FieldLookup::Found(Value::Int(*value)),
            None => FieldLookup::Absent,
        }
    }

    fn branch_column(&self, table: &str) -> Option<&str> {
        self.branch_columns.get(table).map(String::as_str)
    }
}

/// Picks the first row (single) or every row (multi) unless told otherwise.
#[derive(Default)]
pub struct FakePicker {
    answers: HashMap<String, Selection>,
    shown: Mutex<Vec<ChoiceSet>>,
}

impl FakePicker {
    pub fn answer(mut self, title: &str, selection: Selection) -> Self {
        self.answers.insert(title.to_string(), selection);
        self
    }

    pub fn shown(&self) -> Vec<ChoiceSet> {
        self.shown.lock().unwrap().clone()
    }

    pub fn was_shown(&self, title: &str) -> bool {
        self.shown().iter().any(|c| c.title == title)
    }

    fn respond(&self, choices: &ChoiceSet, all: bool) -> Selection {
        self.shown.lock().unwrap().push(choices.clone());
        if let Some(answer) = self.answers.get(&choices.title) {
            return answer.clone();
        }
        let codes: Vec<String> = choices.items.iter().map(|c| c.code.clone()).collect();
        match (all, codes.first()) {
            (_, None) => Selection::Cancelled,
            (true, Some(_)) => Selection::Selected(codes),
            (false, Some(first)) => Selection::Selected(vec![first.clone()]),
        }
    }
}

#[async_trait]
impl Picker for FakePicker {
    async fn select_one(&self, choices: &ChoiceSet) -> Result<Selection, PickerError> {
        Ok(self.respond(choices, false))
    }

    async fn select_many(&self, choices: &ChoiceSet) -> Result<Selection, PickerError> {
        Ok(self.respond(choices, true))
    }
}

/// Operator that answers at once and records that it was asked.
pub struct FakeOperator {
    log: EventLog,
}

impl FakeOperator {
    pub fn new(log: EventLog) -> Self {
        Self { log }
    }
}

#[async_trait]
impl OperatorInput for FakeOperator {
    async fn await_operator(&self, _prompt: &str) -> Result<(), WorkflowError> {
        self.log.push("operator");
        Ok(())
    }
}

/// A scripted Guardian session.
pub struct Harness {
    pub log: EventLog,
    pub engine: Arc<ScriptedEngine>,
    pub data: Arc<FakeData>,
    pub picker: Arc<FakePicker>,
    pub timings: Timings,
}

impl Harness {
    pub fn new(data: FakeData, picker: FakePicker) -> Self {
        let log = EventLog::default();
        Self {
            engine: Arc::new(ScriptedEngine::new(log.clone())),
            log,
            data: Arc::new(data),
            picker: Arc::new(picker),
            timings: Timings::immediate(),
        }
    }

    pub fn desktop(&self) -> Desktop {
        Desktop::with_engine(self.engine.clone())
    }

    pub fn registry() -> Arc<SelectorRegistry> {
        Arc::new(SelectorRegistry::from_json_str(SELECTORS).unwrap())
    }

    pub fn context(&self) -> WorkflowContext {
        WorkflowContext::new(
            self.desktop(),
            Self::registry(),
            self.data.clone(),
            self.picker.clone(),
            Arc::new(FakeOperator::new(self.log.clone())),
            self.timings.clone(),
        )
    }

    /// Element for a scripted window, without counting as a lookup.
    pub fn element(&self, title: &str) -> UIElement {
        let window = {
            let scene = self.engine.scene.lock().unwrap();
            scene
                .windows
                .iter()
                .enumerate()
                .find(|(_, w)| w.attrs.name.as_deref() == Some(title))
                .map(|(id, w)| (id, w.clone()))
                .unwrap()
        };
        self.engine.element(window.0, &window.1)
    }
}
