use super::init_tracing;
use super::mock::{keys, FakeData, FakePicker, Harness, LOGISTICS, MAIN};
use crate::database::Value;
use crate::errors::{AutomationError, WorkflowError};
use crate::picker::Selection;
use crate::workflow::{run_load_for, LoadState, WorkflowReport};
use chrono::NaiveDate;

const ORDERS_TITLE: &str = "Seleção de Pedidos para Carga";

fn guardian(data: FakeData, picker: FakePicker) -> Harness {
    init_tracing();
    let h = Harness::new(data, picker);
    let main = h.engine.window(MAIN);
    h.engine.child(main, LOGISTICS);
    h
}

async fn run(h: &Harness) -> WorkflowReport<LoadState> {
    let today = NaiveDate::from_ymd_opt(2025, 7, 14).unwrap();
    run_load_for(&h.context(), today).await
}

fn logistics(spec: &str) -> String {
    format!("{LOGISTICS}: {}", keys(spec))
}

#[tokio::test]
async fn selected_orders_are_added_to_a_new_load() {
    let h = guardian(FakeData::default(), FakePicker::default());

    let report = run(&h).await;

    assert!(report.is_success(), "{:?}", report.result);
    assert_eq!(
        report.visited,
        vec![
            LoadState::FetchOrders,
            LoadState::SelectOrders,
            LoadState::OpenLogistics,
            LoadState::StartLoad,
            LoadState::EnterOrder(0),
            LoadState::EnterOrder(1),
            LoadState::Done,
        ]
    );
    assert_eq!(
        h.log.events(),
        vec![
            format!("focus {MAIN}"),
            format!("{MAIN}: {}", keys("%l")),
            format!("{MAIN}: {}", keys("{ENTER}")),
            logistics("{F2}"),
            logistics("{ENTER 2}"),
            logistics("1001{ENTER}1{ENTER 4}"),
            logistics("1{ENTER}1002"),
        ]
    );
}

#[tokio::test]
async fn single_order_gets_no_trailing_enters() {
    let h = guardian(
        FakeData::default().with_table(
            "sales_orders",
            &["pedido", "serie"],
            vec![vec![Value::Int(2001), "3".into()]],
        ),
        FakePicker::default(),
    );

    run(&h).await.result.unwrap();

    assert_eq!(h.log.events().last(), Some(&logistics("2001{ENTER}3")));
    assert!(!h.log.events().iter().any(|e| e.contains("{ENTER 4}")));
}

#[tokio::test]
async fn only_the_chosen_order_is_entered() {
    let h = guardian(
        FakeData::default(),
        FakePicker::default().answer(ORDERS_TITLE, Selection::Selected(vec!["1002-1".to_string()])),
    );

    let report = run(&h).await;

    assert!(report.is_success());
    assert!(!report.visited(&LoadState::EnterOrder(1)));
    assert_eq!(h.log.events().last(), Some(&logistics("1002{ENTER}1")));
    assert!(!h.log.events().iter().any(|e| e.contains("1001")));
}

#[tokio::test]
async fn no_orders_today_ends_quietly() {
    let h = guardian(FakeData::default().with_empty("sales_orders"), FakePicker::default());

    let report = run(&h).await;

    assert!(report.is_success());
    assert_eq!(report.visited, vec![LoadState::FetchOrders, LoadState::Done]);
    assert!(!h.picker.was_shown(ORDERS_TITLE));
    assert!(h.log.events().is_empty());
}

#[tokio::test]
async fn empty_selection_aborts_before_the_ui() {
    let h = guardian(
        FakeData::default(),
        FakePicker::default().answer(ORDERS_TITLE, Selection::Cancelled),
    );

    let report = run(&h).await;

    assert!(matches!(report.result, Err(WorkflowError::Cancelled(_))));
    assert!(h.log.events().is_empty());
}

#[tokio::test]
async fn missing_logistics_window_fails_the_run() {
    init_tracing();
    let h = Harness::new(FakeData::default(), FakePicker::default());
    h.engine.window(MAIN);

    let report = run(&h).await;

    assert!(matches!(
        report.result,
        Err(WorkflowError::Automation(AutomationError::Timeout(_)))
    ));
    assert_eq!(report.visited.last(), Some(&LoadState::StartLoad));
}

#[tokio::test]
async fn order_picker_shows_number_and_series() {
    let h = guardian(FakeData::default(), FakePicker::default());

    run(&h).await.result.unwrap();

    let shown = h.picker.shown();
    let orders = shown.iter().find(|c| c.title == ORDERS_TITLE).unwrap();
    assert_eq!(orders.headers, vec!["Selecionar", "Pedido", "Série"]);
    assert_eq!(orders.items[0].code, "1001-1");
    assert_eq!(orders.items[0].columns, vec!["1001", "1"]);
}
