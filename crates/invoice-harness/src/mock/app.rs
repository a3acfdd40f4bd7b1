//! Scripted stand-in for the invoicing web app, used by unit tests.
//!
//! Renders the access-code gate and the invoices screen into a [`MockDom`]
//! and implements the filters, logout confirmation and row deletion over a
//! small in-memory data set.

#![allow(clippy::unwrap_used)]

use super::dom::DialogHandler;
use super::{El, MockDom, MockDriver, MockLauncher, NodeId};
use crate::dialog::Dialog;
use crate::env::EnvConfig;
use crate::fixture::Fixtures;
use crate::pages::access_code::INVALID_CODE_MESSAGE;
use crate::pages::invoices::ALL_STATUSES;
use crate::selector::Selector;
use crate::session::Session;
use chrono::NaiveDate;
use std::sync::{Arc, Mutex};

pub(crate) const BASE_URL: &str = "https://app.test/";
pub(crate) const ACCESS_CODE: &str = "1234";
pub(crate) const RANGE_ERROR: &str = "La fecha inicial no puede ser mayor que la fecha final";
pub(crate) const NEW_INVOICE_PATH: &str = "new";

const STATUSES: [&str; 3] = ["Vigente", "Pagado", "NO EXISTE"];

#[derive(Debug, Clone)]
struct Invoice {
    id: u32,
    number: String,
    total_cents: u64,
    date: NaiveDate,
    status: &'static str,
    deleted: bool,
}

#[derive(Debug)]
struct AppState {
    logged_in: bool,
    /// Logout and delete ask for confirmation first
    confirm_actions: bool,
    invoices: Vec<Invoice>,
}

type Shared = Arc<Mutex<AppState>>;

fn seed() -> Vec<Invoice> {
    let rows = [
        ("FAC-001", 125_000, (2024, 1, 15), "Vigente", false),
        ("FAC-002", 89_990, (2024, 2, 3), "Pagado", false),
        ("FAC-003", 15_000, (2024, 2, 20), "NO EXISTE", false),
        ("FAC-010", 310_050, (2024, 3, 5), "Vigente", false),
        ("FAC-011", 42_000, (2024, 3, 18), "Pagado", false),
        ("FAC-099", 7_500, (2024, 4, 1), "Vigente", true),
    ];
    rows.iter()
        .zip(1..)
        .map(|(&(number, total_cents, (y, m, d), status, deleted), id)| Invoice {
            id,
            number: number.to_string(),
            total_cents,
            date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
            status,
            deleted,
        })
        .collect()
}

/// Fresh app document; nothing is rendered until the first navigation
pub(crate) fn invoice_app() -> MockDom {
    build_app(true)
}

/// Variant of the app whose logout and delete act without a confirm dialog
pub(crate) fn invoice_app_without_confirm() -> MockDom {
    build_app(false)
}

fn build_app(confirm_actions: bool) -> MockDom {
    let state: Shared = Arc::new(Mutex::new(AppState {
        logged_in: false,
        confirm_actions,
        invoices: seed(),
    }));
    let mut dom = MockDom::new("about:blank");
    dom.set_router(Arc::new(move |dom: &mut MockDom, _url: &str| {
        if state.lock().unwrap().logged_in {
            dom.set_url(format!("{BASE_URL}invoices"));
            render_invoices(&state, dom);
        } else {
            dom.set_url(BASE_URL);
            render_gate(&state, dom);
        }
    }));
    dom
}

/// Configuration pointing at the mock app with short budgets
pub(crate) fn config() -> Arc<EnvConfig> {
    Arc::new(
        EnvConfig::from_vars(vec![
            ("WEB_BASE_URL", BASE_URL),
            ("WEB_ACCESS_CODE", ACCESS_CODE),
            ("EXPECT_TIMEOUT_MS", "300"),
            ("ACTION_TIMEOUT_MS", "300"),
            ("SEARCH_SETTLE_MS", "0"),
        ])
        .unwrap(),
    )
}

pub(crate) fn session() -> (Session, MockDriver) {
    session_over(invoice_app())
}

fn session_over(dom: MockDom) -> (Session, MockDriver) {
    let driver = MockDriver::new(dom);
    let session = Session::new(Arc::new(driver.clone()), &config());
    (session, driver)
}

pub(crate) fn fixtures_with_driver() -> (Fixtures, MockDriver) {
    let (session, driver) = session();
    (Fixtures::new(session, config()), driver)
}

pub(crate) fn fixtures_without_confirm() -> (Fixtures, MockDriver) {
    let (session, driver) = session_over(invoice_app_without_confirm());
    (Fixtures::new(session, config()), driver)
}

pub(crate) fn fixtures() -> Fixtures {
    fixtures_with_driver().0
}

pub(crate) fn launcher() -> MockLauncher {
    MockLauncher::new(invoice_app)
}

fn find(dom: &MockDom, css: &str) -> NodeId {
    dom.find(&Selector::css(css)).unwrap()
}

/// Run `action` now, or behind a confirm dialog when the app asks first
fn confirm_then(state: &Shared, dom: &mut MockDom, message: &str, action: DialogHandler) {
    let confirm = state.lock().unwrap().confirm_actions;
    if confirm {
        dom.open_dialog(Dialog::confirm(message), Some(action));
    } else {
        action(dom);
    }
}

// ---- access gate ------------------------------------------------------

fn render_gate(state: &Shared, dom: &mut MockDom) {
    let root = dom.root();
    dom.clear_children(root);
    let main = dom.append(root, El::new("main"));
    dom.append(main, El::new("h1").text("Portal de Candidatos"));
    dom.append(main, El::new("label").attr("for", "access-code").text("Código de acceso"));
    dom.append(main, El::new("input").id("access-code").attr("type", "text"));
    let submit = dom.append(main, El::new("button").text("Validar Código"));

    let state = Arc::clone(state);
    dom.on_click(submit, move |dom, _| {
        let code = dom.value(find(dom, "#access-code"));
        if code == ACCESS_CODE {
            state.lock().unwrap().logged_in = true;
            dom.set_url(format!("{BASE_URL}invoices"));
            render_invoices(&state, dom);
        } else if dom.find(&Selector::css("#access-error")).is_none() {
            let main = find(dom, "main");
            dom.append(main, El::new("p").id("access-error").text(INVALID_CODE_MESSAGE));
        }
    });
}

// ---- invoices screen --------------------------------------------------

fn render_invoices(state: &Shared, dom: &mut MockDom) {
    let root = dom.root();
    dom.clear_children(root);

    let header = dom.append(root, El::new("header"));
    let nav = dom.append(header, El::new("nav"));
    dom.append(nav, El::new("h2").text("Candidate Portal"));
    dom.append(header, El::new("h1").text("Sistema de Facturas"));
    let logout = dom.append(header, El::new("button").text("Cerrar Sesión"));
    let on_logout = Arc::clone(state);
    dom.on_click(logout, move |dom, _| {
        let state = Arc::clone(&on_logout);
        confirm_then(
            &on_logout,
            dom,
            "¿Está seguro que desea cerrar sesión?",
            Arc::new(move |dom: &mut MockDom| {
                state.lock().unwrap().logged_in = false;
                dom.set_url(BASE_URL);
                render_gate(&state, dom);
            }),
        );
    });

    let main = dom.append(root, El::new("main"));
    let filters = dom.append(main, El::new("section"));
    dom.append(filters, El::new("h2").text("Filtros de Búsqueda"));
    dom.append(filters, El::new("label").attr("for", "invoice-number").text("Número de Factura"));
    dom.append(
        filters,
        El::new("input")
            .id("invoice-number")
            .attr("type", "text")
            .attr("placeholder", "Ej: FAC-001"),
    );
    dom.append(filters, El::new("label").attr("for", "estado").text("Estado"));
    let select = dom.append(filters, El::new("select").id("estado"));
    dom.append(select, El::new("option").attr("value", "").text(ALL_STATUSES));
    for status in STATUSES {
        dom.append(select, El::new("option").attr("value", status).text(status));
    }
    for (id, label) in [("fecha-inicial", "Fecha Inicial"), ("fecha-final", "Fecha Final")] {
        dom.append(filters, El::new("label").attr("for", id).text(label));
        dom.append(
            filters,
            El::new("input")
                .id(id)
                .attr("type", "date")
                .attr("placeholder", "mm/dd/yyyy"),
        );
    }
    let toggle = dom.append(filters, El::new("label").text("Incluir facturas eliminadas"));
    dom.append(toggle, El::new("input").id("include-deleted").attr("type", "checkbox"));

    let search = dom.append(filters, El::new("button").text("Buscar"));
    let on_search = Arc::clone(state);
    dom.on_click(search, move |dom, _| render_rows(&on_search, dom));

    let clear = dom.append(filters, El::new("button").text("Limpiar Filtros"));
    let on_clear = Arc::clone(state);
    dom.on_click(clear, move |dom, _| {
        for css in ["#invoice-number", "#fecha-inicial", "#fecha-final"] {
            let input = find(dom, css);
            dom.set_value(input, "");
        }
        let select = find(dom, "#estado");
        dom.select_option(select, ALL_STATUSES);
        let toggle = find(dom, "#include-deleted");
        dom.set_checked(toggle, false);
        render_rows(&on_clear, dom);
    });

    let new_invoice = dom.append(filters, El::new("button").text("Nueva Factura"));
    dom.on_click(new_invoice, |dom, _| {
        dom.set_url(format!("{BASE_URL}{NEW_INVOICE_PATH}"));
        let root = dom.root();
        dom.clear_children(root);
        let form = dom.append(root, El::new("form"));
        dom.append(form, El::new("h1").text("Nueva Factura"));
        dom.append(form, El::new("label").attr("for", "customer").text("Cliente"));
        dom.append(form, El::new("input").id("customer").attr("type", "text"));
    });

    let table = dom.append(main, El::new("table"));
    let head = dom.append(table, El::new("thead"));
    let head_row = dom.append(head, El::new("tr"));
    for title in ["ID", "Número de Factura", "Total", "Fecha", "Estado", "Acciones"] {
        dom.append(head_row, El::new("th").text(title));
    }
    dom.append(table, El::new("tbody"));
    render_rows(state, dom);
}

#[derive(Debug, Default)]
struct Filters {
    number: String,
    status: Option<String>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    include_deleted: bool,
}

fn read_filters(dom: &MockDom) -> Filters {
    let date = |css: &str| NaiveDate::parse_from_str(&dom.value(find(dom, css)), "%Y-%m-%d").ok();
    let status = dom
        .state(find(dom, "#estado"))
        .selected_label
        .filter(|label| label != ALL_STATUSES);
    Filters {
        number: dom.value(find(dom, "#invoice-number")).trim().to_lowercase(),
        status,
        start: date("#fecha-inicial"),
        end: date("#fecha-final"),
        include_deleted: dom.state(find(dom, "#include-deleted")).checked,
    }
}

impl Filters {
    fn admits(&self, invoice: &Invoice) -> bool {
        (self.include_deleted || !invoice.deleted)
            && invoice.number.to_lowercase().contains(&self.number)
            && self
                .status
                .as_ref()
                .map_or(true, |s| s.eq_ignore_ascii_case(invoice.status))
            && self.start.map_or(true, |start| invoice.date >= start)
            && self.end.map_or(true, |end| invoice.date <= end)
    }
}

fn format_total(cents: u64) -> String {
    let units = (cents / 100).to_string();
    let mut grouped = String::new();
    for (i, c) in units.chars().enumerate() {
        if i > 0 && (units.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    format!("${grouped}.{:02}", cents % 100)
}

fn render_rows(state: &Shared, dom: &mut MockDom) {
    let tbody = find(dom, "table tbody");
    dom.clear_children(tbody);
    if let Some(error) = dom.find(&Selector::css("#range-error")) {
        dom.remove(error);
    }

    let filters = read_filters(dom);
    if let (Some(start), Some(end)) = (filters.start, filters.end) {
        if start > end {
            let main = find(dom, "main");
            dom.append(main, El::new("p").id("range-error").text(RANGE_ERROR));
            return;
        }
    }

    let shown: Vec<Invoice> = state
        .lock()
        .unwrap()
        .invoices
        .iter()
        .filter(|invoice| filters.admits(invoice))
        .cloned()
        .collect();

    for invoice in shown {
        let row = dom.append(tbody, El::new("tr"));
        dom.append(row, El::new("td").text(invoice.id.to_string()));
        dom.append(row, El::new("td").text(&invoice.number));
        dom.append(row, El::new("td").text(format_total(invoice.total_cents)));
        dom.append(row, El::new("td").text(invoice.date.format("%m/%d/%Y").to_string()));
        dom.append(row, El::new("td").text(invoice.status));
        let actions = dom.append(row, El::new("td"));
        dom.append(actions, El::new("button").text("Ver"));
        let delete = dom.append(actions, El::new("button").text("Eliminar"));

        let on_delete = Arc::clone(state);
        let id = invoice.id;
        dom.on_click(delete, move |dom, _| {
            let state = Arc::clone(&on_delete);
            confirm_then(
                &on_delete,
                dom,
                "¿Está seguro que desea eliminar esta factura?",
                Arc::new(move |dom: &mut MockDom| {
                    if let Some(invoice) = state
                        .lock()
                        .unwrap()
                        .invoices
                        .iter_mut()
                        .find(|invoice| invoice.id == id)
                    {
                        invoice.deleted = true;
                    }
                    render_rows(&state, dom);
                }),
            );
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_totals_are_grouped() {
        assert_eq!(format_total(125_000), "$1,250.00");
        assert_eq!(format_total(7_500), "$75.00");
        assert_eq!(format_total(123_456_789), "$1,234,567.89");
    }

    #[test]
    fn test_router_renders_gate_first() {
        let mut dom = invoice_app();
        dom.navigate(BASE_URL);
        assert!(dom.find(&Selector::css("#access-code")).is_some());
        assert_eq!(dom.url(), BASE_URL);
    }
}
