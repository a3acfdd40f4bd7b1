//! In-memory document used by [`MockDriver`](super::MockDriver).
//!
//! Nodes live in an arena and are addressed by [`NodeId`]. Behaviour is
//! scripted with click handlers (`on_click`) and a navigation router
//! (`set_router`); handlers receive `&mut MockDom` and may rebuild any part
//! of the document, change the URL or open a native dialog.

use super::css;
use crate::dialog::Dialog;
use crate::driver::ElementState;
use crate::selector::{normalize_whitespace, Selector};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Arena index of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Handler run when an element (or one of its descendants) is clicked
pub type ClickHandler = Arc<dyn Fn(&mut MockDom, NodeId) + Send + Sync>;

/// Handler run on navigation with the target URL
pub type Router = Arc<dyn Fn(&mut MockDom, &str) + Send + Sync>;

/// Handler run when a pending dialog is accepted
pub type DialogHandler = Arc<dyn Fn(&mut MockDom) + Send + Sync>;

/// Element description used to build the document
#[derive(Debug, Clone, Default)]
pub struct El {
    tag: String,
    attrs: BTreeMap<String, String>,
    text: String,
    hidden: bool,
    checked: bool,
}

impl El {
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn id(self, id: impl Into<String>) -> Self {
        self.attr("id", id)
    }

    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    #[must_use]
    pub fn checked(mut self, checked: bool) -> Self {
        self.checked = checked;
        self
    }
}

#[derive(Debug, Clone)]
struct Node {
    tag: String,
    attrs: BTreeMap<String, String>,
    text: String,
    hidden: bool,
    value: String,
    checked: bool,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

struct PendingDialog {
    dialog: Dialog,
    on_accept: Option<DialogHandler>,
}

/// Scriptable in-memory document
pub struct MockDom {
    nodes: Vec<Node>,
    url: String,
    handlers: HashMap<NodeId, ClickHandler>,
    router: Option<Router>,
    pending_dialog: Option<PendingDialog>,
    dialog_armed: bool,
    dismissed: Vec<Dialog>,
}

impl fmt::Debug for MockDom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockDom")
            .field("url", &self.url)
            .field("nodes", &self.nodes.len())
            .field("handlers", &self.handlers.len())
            .finish_non_exhaustive()
    }
}

const ROOT: NodeId = NodeId(0);

impl MockDom {
    /// Empty document at `url`
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            nodes: vec![Node {
                tag: "#document".to_string(),
                attrs: BTreeMap::new(),
                text: String::new(),
                hidden: false,
                value: String::new(),
                checked: false,
                parent: None,
                children: Vec::new(),
            }],
            url: url.into(),
            handlers: HashMap::new(),
            router: None,
            pending_dialog: None,
            dialog_armed: false,
            dismissed: Vec::new(),
        }
    }

    #[must_use]
    pub const fn root(&self) -> NodeId {
        ROOT
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Change the URL without rendering (client-side routing)
    pub fn set_url(&mut self, url: impl Into<String>) {
        self.url = url.into();
    }

    /// Install the navigation router
    pub fn set_router(&mut self, router: Router) {
        self.router = Some(router);
    }

    /// Navigate: clear the document and let the router render `url`
    pub fn navigate(&mut self, url: &str) {
        self.url = url.to_string();
        self.clear_children(ROOT);
        self.handlers.clear();
        if let Some(router) = self.router.clone() {
            router(self, url);
        }
    }

    /// Append a child element, returning its id
    pub fn append(&mut self, parent: NodeId, el: El) -> NodeId {
        let id = NodeId(self.nodes.len());
        let value = el.attrs.get("value").cloned().unwrap_or_default();
        self.nodes.push(Node {
            tag: el.tag,
            attrs: el.attrs,
            text: el.text,
            hidden: el.hidden,
            value,
            checked: el.checked,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Detach a node (and its subtree) from the document
    pub fn remove(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != id);
        }
    }

    /// Detach every child of `id`
    pub fn clear_children(&mut self, id: NodeId) {
        let children = std::mem::take(&mut self.nodes[id.0].children);
        for child in children {
            self.nodes[child.0].parent = None;
        }
    }

    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) {
        self.nodes[id.0].text = text.into();
    }

    pub fn set_hidden(&mut self, id: NodeId, hidden: bool) {
        self.nodes[id.0].hidden = hidden;
    }

    pub fn set_value(&mut self, id: NodeId, value: impl Into<String>) {
        self.nodes[id.0].value = value.into();
    }

    pub fn set_checked(&mut self, id: NodeId, checked: bool) {
        self.nodes[id.0].checked = checked;
    }

    /// Register a click handler on `id`
    pub fn on_click(
        &mut self,
        id: NodeId,
        handler: impl Fn(&mut Self, NodeId) + Send + Sync + 'static,
    ) {
        self.handlers.insert(id, Arc::new(handler));
    }

    /// Open a native dialog. If nothing is armed to accept it, it is
    /// dismissed immediately and `on_accept` never runs.
    pub fn open_dialog(&mut self, dialog: Dialog, on_accept: Option<DialogHandler>) {
        if self.dialog_armed {
            self.pending_dialog = Some(PendingDialog { dialog, on_accept });
        } else {
            warn!("Dismissing unexpected {} dialog: {}", dialog.dialog_type(), dialog.message());
            self.dismissed.push(dialog);
        }
    }

    pub(crate) fn set_dialog_armed(&mut self, armed: bool) {
        self.dialog_armed = armed;
    }

    /// Accept the pending dialog, if any, running its accept handler
    pub(crate) fn accept_pending_dialog(&mut self) -> Option<Dialog> {
        let pending = self.pending_dialog.take()?;
        if let Some(handler) = pending.on_accept {
            handler(self);
        }
        Some(pending.dialog)
    }

    /// Dialogs dismissed because nothing was armed
    pub fn dismissed_dialogs(&self) -> &[Dialog] {
        &self.dismissed
    }

    // ---- read access --------------------------------------------------

    pub fn tag(&self, id: NodeId) -> &str {
        &self.nodes[id.0].tag
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.nodes[id.0].attrs.get(name).map(String::as_str)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    fn is_attached(&self, id: NodeId) -> bool {
        let mut current = id;
        loop {
            if current == ROOT {
                return true;
            }
            match self.nodes[current.0].parent {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// Attached, and neither the node nor any ancestor is hidden
    pub fn is_visible(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if self.nodes[node.0].hidden {
                return false;
            }
            current = self.nodes[node.0].parent;
        }
        self.is_attached(id)
    }

    /// Own text followed by the text of every descendant
    pub fn text_content(&self, id: NodeId) -> String {
        let node = &self.nodes[id.0];
        let mut parts = vec![node.text.clone()];
        parts.extend(node.children.iter().map(|&c| self.text_content(c)));
        normalize_whitespace(&parts.join(" "))
    }

    fn is_control(&self, id: NodeId) -> bool {
        matches!(self.tag(id), "input" | "select" | "textarea")
    }

    fn input_type(&self, id: NodeId) -> String {
        self.attr(id, "type").unwrap_or("text").to_ascii_lowercase()
    }

    fn options(&self, select: NodeId) -> Vec<NodeId> {
        self.children(select)
            .iter()
            .copied()
            .filter(|&c| self.tag(c) == "option")
            .collect()
    }

    fn selected_option(&self, select: NodeId) -> Option<NodeId> {
        let options = self.options(select);
        options
            .iter()
            .copied()
            .find(|&o| self.attr(o, "selected").is_some())
            .or_else(|| options.first().copied())
    }

    fn option_value(&self, option: NodeId) -> String {
        self.attr(option, "value")
            .map_or_else(|| self.text_content(option), str::to_string)
    }

    /// Current value of a form control
    pub fn value(&self, id: NodeId) -> String {
        if self.tag(id) == "select" {
            return self
                .selected_option(id)
                .map(|o| self.option_value(o))
                .unwrap_or_default();
        }
        self.nodes[id.0].value.clone()
    }

    /// `:checked` semantics: checked inputs and selected options
    pub fn is_checked_or_selected(&self, id: NodeId) -> bool {
        if self.tag(id) == "option" {
            return self
                .parent(id)
                .and_then(|p| self.selected_option(p))
                .is_some_and(|selected| selected == id);
        }
        self.nodes[id.0].checked
    }

    fn implicit_role(&self, id: NodeId) -> Option<&'static str> {
        match self.tag(id) {
            "button" => Some("button"),
            "a" if self.attr(id, "href").is_some() => Some("link"),
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => Some("heading"),
            "select" => Some("combobox"),
            "textarea" => Some("textbox"),
            "tr" => Some("row"),
            "td" => Some("cell"),
            "th" => Some("columnheader"),
            "table" => Some("table"),
            "nav" => Some("navigation"),
            "main" => Some("main"),
            "input" => match self.input_type(id).as_str() {
                "checkbox" => Some("checkbox"),
                "button" | "submit" | "reset" => Some("button"),
                "text" | "email" | "search" | "tel" | "url" => Some("textbox"),
                _ => None,
            },
            _ => None,
        }
    }

    /// Explicit `role` attribute, else the tag's implicit role
    pub fn role(&self, id: NodeId) -> Option<String> {
        self.attr(id, "role")
            .map(str::to_string)
            .or_else(|| self.implicit_role(id).map(str::to_string))
    }

    fn label_text(&self, id: NodeId) -> Option<String> {
        if let Some(aria) = self.attr(id, "aria-label") {
            return Some(aria.to_string());
        }
        let mut labels = Vec::new();
        if let Some(control_id) = self.attr(id, "id") {
            labels.extend(self.descendants(ROOT).into_iter().filter(|&n| {
                self.tag(n) == "label" && self.attr(n, "for") == Some(control_id)
            }));
        }
        let mut ancestor = self.parent(id);
        while let Some(a) = ancestor {
            if self.tag(a) == "label" && !labels.contains(&a) {
                labels.push(a);
            }
            ancestor = self.parent(a);
        }
        if labels.is_empty() {
            return None;
        }
        Some(
            labels
                .iter()
                .map(|&l| self.text_content(l))
                .collect::<Vec<_>>()
                .join(" "),
        )
    }

    /// Accessible name: aria-label, else label text, else text content
    pub fn accessible_name(&self, id: NodeId) -> String {
        if let Some(label) = self.label_text(id) {
            return label;
        }
        if self.tag(id) == "input" {
            return match self.input_type(id).as_str() {
                "button" | "submit" | "reset" => self.value(id),
                _ => self.attr(id, "placeholder").unwrap_or_default().to_string(),
            };
        }
        if self.is_control(id) {
            return String::new();
        }
        self.text_content(id)
    }

    /// Attached descendants of `scope` in document order, excluding `scope`
    pub fn descendants(&self, scope: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(scope).iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        out
    }

    // ---- selector interpretation ---------------------------------------

    /// Elements matched by `selector` in document order
    pub fn query(&self, selector: &Selector) -> Vec<NodeId> {
        self.query_in(ROOT, selector)
    }

    /// First match of `selector`, for test setup
    pub fn find(&self, selector: &Selector) -> Option<NodeId> {
        self.query(selector).first().copied()
    }

    fn query_in(&self, scope: NodeId, selector: &Selector) -> Vec<NodeId> {
        match selector {
            Selector::Css(s) => match css::parse(s) {
                Ok(list) => self
                    .descendants(scope)
                    .into_iter()
                    .filter(|&n| list.matches(self, n))
                    .collect(),
                Err(e) => {
                    warn!("Unsupported selector {:?} in mock document: {}", s, e.0);
                    Vec::new()
                }
            },
            Selector::TestId(id) => self.filter(scope, |n| self.attr(n, "data-testid") == Some(id.as_str())),
            Selector::Role { role, name } => self.filter(scope, |n| {
                self.role(n).as_deref() == Some(role.as_str())
                    && name
                        .as_ref()
                        .map_or(true, |m| m.matches(&self.accessible_name(n)))
            }),
            Selector::Label(m) => self.filter(scope, |n| {
                self.is_control(n) && self.label_text(n).is_some_and(|l| m.matches(&l))
            }),
            Selector::Placeholder(m) => self.filter(scope, |n| {
                self.attr(n, "placeholder").is_some_and(|p| m.matches(p))
            }),
            Selector::Text(m) => self.filter(scope, |n| {
                !matches!(self.tag(n), "script" | "style")
                    && m.matches(&self.text_content(n))
                    && !self
                        .children(n)
                        .iter()
                        .any(|&c| m.matches(&self.text_content(c)))
            }),
            Selector::Nth { inner, index } => self
                .query_in(scope, inner)
                .get(*index)
                .copied()
                .into_iter()
                .collect(),
            Selector::Last(inner) => self.query_in(scope, inner).last().copied().into_iter().collect(),
            Selector::Within { scope: outer, inner } => {
                let mut out = Vec::new();
                for s in self.query_in(scope, outer) {
                    for n in self.query_in(s, inner) {
                        if !out.contains(&n) {
                            out.push(n);
                        }
                    }
                }
                out
            }
            Selector::Has { inner, has } => self
                .query_in(scope, inner)
                .into_iter()
                .filter(|&n| !self.query_in(n, has).is_empty())
                .collect(),
        }
    }

    fn filter(&self, scope: NodeId, pred: impl Fn(NodeId) -> bool) -> Vec<NodeId> {
        self.descendants(scope).into_iter().filter(|&n| pred(n)).collect()
    }

    /// Snapshot of a node in the driver's wire shape
    pub fn state(&self, id: NodeId) -> ElementState {
        let node = &self.nodes[id.0];
        let is_select = node.tag == "select";
        ElementState {
            visible: self.is_visible(id),
            text: self.text_content(id),
            value: self.is_control(id).then(|| self.value(id)),
            checked: node.checked,
            attributes: node.attrs.clone().into_iter().collect(),
            selected_label: if is_select {
                self.selected_option(id).map(|o| self.text_content(o))
            } else {
                None
            },
        }
    }

    // ---- actions ---------------------------------------------------------

    /// Click: toggles checkboxes, then runs the nearest click handler
    pub fn click(&mut self, id: NodeId) {
        if self.tag(id) == "input" && self.input_type(id) == "checkbox" {
            let checked = self.nodes[id.0].checked;
            self.nodes[id.0].checked = !checked;
        }
        let mut target = Some(id);
        while let Some(node) = target {
            if let Some(handler) = self.handlers.get(&node).cloned() {
                handler(self, id);
                return;
            }
            target = self.parent(node);
        }
    }

    /// Fill a text-like control. Date inputs sanitise anything that is not
    /// `YYYY-MM-DD` to the empty string, like a browser does.
    pub fn fill(&mut self, id: NodeId, value: &str) -> bool {
        if !matches!(self.tag(id), "input" | "textarea") {
            return false;
        }
        let value = if self.input_type(id) == "date" && !is_iso_date(value) {
            String::new()
        } else {
            value.to_string()
        };
        self.nodes[id.0].value = value;
        true
    }

    /// Select the option whose label equals `label`
    pub fn select_option(&mut self, id: NodeId, label: &str) -> bool {
        if self.tag(id) != "select" {
            return false;
        }
        let wanted = normalize_whitespace(label);
        let options = self.options(id);
        let Some(target) = options
            .iter()
            .copied()
            .find(|&o| self.text_content(o) == wanted)
        else {
            return false;
        };
        for option in options {
            self.nodes[option.0].attrs.remove("selected");
        }
        self.nodes[target.0]
            .attrs
            .insert("selected".to_string(), String::new());
        true
    }
}

fn is_iso_date(value: &str) -> bool {
    value.len() == 10 && chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::selector::TextMatch;

    fn form() -> MockDom {
        let mut dom = MockDom::new("https://app.test/");
        let root = dom.root();
        let main = dom.append(root, El::new("main"));
        dom.append(main, El::new("h1").text("Sistema de Facturas"));
        dom.append(main, El::new("label").attr("for", "estado").text("Estado"));
        let select = dom.append(main, El::new("select").id("estado"));
        dom.append(select, El::new("option").text("Todos los estados"));
        dom.append(select, El::new("option").attr("value", "vigente").text("Vigente"));
        let wrapper = dom.append(main, El::new("label").text("Incluir facturas eliminadas"));
        dom.append(wrapper, El::new("input").attr("type", "checkbox"));
        dom.append(main, El::new("input").attr("type", "date").attr("aria-label", "Fecha Inicial"));
        dom.append(main, El::new("button").text("Buscar"));
        dom.append(main, El::new("button").text("Oculto").hidden());
        dom
    }

    mod selector_tests {
        use super::*;

        #[test]
        fn test_role_with_label_name() {
            let dom = form();
            let select = dom.query(&Selector::role_named("combobox", "Estado"));
            assert_eq!(select.len(), 1);
            assert_eq!(dom.tag(select[0]), "select");
        }

        #[test]
        fn test_label_by_nesting_and_aria() {
            let dom = form();
            let checkbox = dom.query(&Selector::label("Incluir facturas eliminadas"));
            assert_eq!(checkbox.len(), 1);
            assert_eq!(dom.attr(checkbox[0], "type"), Some("checkbox"));
            assert_eq!(dom.query(&Selector::label("Fecha Inicial")).len(), 1);
        }

        #[test]
        fn test_text_picks_innermost() {
            let dom = form();
            let heading = dom.query(&Selector::text(TextMatch::exact("Sistema de Facturas")));
            assert_eq!(heading.len(), 1);
            assert_eq!(dom.tag(heading[0]), "h1");
        }

        #[test]
        fn test_nth_and_last() {
            let dom = form();
            let buttons = Selector::role("button");
            assert_eq!(dom.query(&buttons).len(), 2);
            let last = dom.query(&buttons.clone().last());
            assert_eq!(dom.text_content(last[0]), "Oculto");
            assert!(dom.query(&buttons.nth(5)).is_empty());
        }

        #[test]
        fn test_has_filters_scopes() {
            let dom = form();
            let mains = dom.query(&Selector::css("main").has(Selector::text(TextMatch::exact("Buscar"))));
            assert_eq!(mains.len(), 1);
            let none = dom.query(&Selector::css("main").has(Selector::text(TextMatch::exact("FAC-999"))));
            assert!(none.is_empty());
        }
    }

    mod action_tests {
        use super::*;

        #[test]
        fn test_select_option_updates_state() {
            let mut dom = form();
            let select = dom.find(&Selector::css("select")).unwrap();
            assert_eq!(dom.state(select).selected_label.as_deref(), Some("Todos los estados"));
            assert!(dom.select_option(select, "Vigente"));
            let state = dom.state(select);
            assert_eq!(state.selected_label.as_deref(), Some("Vigente"));
            assert_eq!(state.value.as_deref(), Some("vigente"));
            assert!(!dom.select_option(select, "Anulada"));
        }

        #[test]
        fn test_checkbox_click_toggles() {
            let mut dom = form();
            let checkbox = dom.find(&Selector::css("input[type=\"checkbox\"]")).unwrap();
            dom.click(checkbox);
            assert!(dom.state(checkbox).checked);
            dom.click(checkbox);
            assert!(!dom.state(checkbox).checked);
        }

        #[test]
        fn test_date_fill_sanitises() {
            let mut dom = form();
            let date = dom.find(&Selector::label("Fecha Inicial")).unwrap();
            assert!(dom.fill(date, "2024-01-31"));
            assert_eq!(dom.value(date), "2024-01-31");
            assert!(dom.fill(date, "31/31/2024"));
            assert_eq!(dom.value(date), "");
        }

        #[test]
        fn test_hidden_and_removed_are_invisible() {
            let mut dom = form();
            let hidden = dom.find(&Selector::role_named("button", "Oculto")).unwrap();
            assert!(!dom.is_visible(hidden));
            let search = dom.find(&Selector::role_named("button", "Buscar")).unwrap();
            assert!(dom.is_visible(search));
            dom.remove(search);
            assert!(!dom.is_visible(search));
            assert!(dom.query(&Selector::role_named("button", "Buscar")).is_empty());
        }

        #[test]
        fn test_click_handler_bubbles() {
            let mut dom = MockDom::new("https://app.test/");
            let button = dom.append(dom.root(), El::new("button"));
            let span = dom.append(button, El::new("span").text("Nueva Factura"));
            dom.on_click(button, |dom, _| dom.set_url("https://app.test/new"));
            dom.click(span);
            assert_eq!(dom.url(), "https://app.test/new");
        }

        #[test]
        fn test_unarmed_dialog_is_dismissed() {
            let mut dom = MockDom::new("https://app.test/");
            dom.open_dialog(Dialog::confirm("¿Eliminar?"), None);
            assert_eq!(dom.dismissed_dialogs().len(), 1);
            assert!(dom.accept_pending_dialog().is_none());
        }
    }
}
