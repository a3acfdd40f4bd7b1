//! DOM query scripts evaluated by the CDP driver.
//!
//! Every script is a self-contained expression: the `H` helper prelude
//! followed by one operation over the elements a [`Selector`] resolves to.
//! Scripts always evaluate to a JSON value (never `undefined`).

use crate::driver::ElementAction;
use crate::selector::Selector;

/// Helper library shared by all scripts. Mirrors the matching rules of the
/// mock driver in `crate::mock`.
pub const QUERY_PRELUDE: &str = r#"const H = {
  norm: (s) => (s || '').replace(/\s+/g, ' ').trim(),
  m: (text, m) => {
    const t = H.norm(text);
    if (m.kind === 'exact') return t === H.norm(m.value);
    const lower = t.toLowerCase();
    if (m.kind === 'contains') return lower.includes(H.norm(m.value).toLowerCase());
    return m.value.some((v) => lower.includes(H.norm(v).toLowerCase()));
  },
  visible: (el) => {
    const style = window.getComputedStyle(el);
    if (style.visibility === 'hidden' || style.display === 'none') return false;
    return !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length);
  },
  all: (root) => Array.from(root.querySelectorAll('*')),
  css: (root, s) => Array.from(root.querySelectorAll(s)),
  implicitRole: (el) => {
    const tag = el.tagName.toLowerCase();
    const type = (el.getAttribute('type') || 'text').toLowerCase();
    switch (tag) {
      case 'button': return 'button';
      case 'a': return el.hasAttribute('href') ? 'link' : null;
      case 'h1': case 'h2': case 'h3': case 'h4': case 'h5': case 'h6': return 'heading';
      case 'select': return 'combobox';
      case 'textarea': return 'textbox';
      case 'tr': return 'row';
      case 'td': return 'cell';
      case 'th': return 'columnheader';
      case 'table': return 'table';
      case 'nav': return 'navigation';
      case 'main': return 'main';
      case 'input':
        if (type === 'checkbox') return 'checkbox';
        if (type === 'button' || type === 'submit' || type === 'reset') return 'button';
        if (['text', 'email', 'search', 'tel', 'url'].includes(type)) return 'textbox';
        return null;
      default: return null;
    }
  },
  role: (el) => el.getAttribute('role') || H.implicitRole(el),
  isControl: (el) => ['INPUT', 'SELECT', 'TEXTAREA'].includes(el.tagName),
  labelText: (el) => {
    const aria = el.getAttribute('aria-label');
    if (aria) return aria;
    if (el.labels && el.labels.length) return Array.from(el.labels).map((l) => l.textContent).join(' ');
    return null;
  },
  name: (el) => {
    const label = H.labelText(el);
    if (label !== null) return label;
    if (el.tagName === 'INPUT') {
      const type = (el.getAttribute('type') || '').toLowerCase();
      if (type === 'button' || type === 'submit' || type === 'reset') return el.value;
      return el.getAttribute('placeholder') || '';
    }
    if (H.isControl(el)) return '';
    return el.textContent;
  },
  byRole: (root, role, m) => H.all(root).filter((el) => H.role(el) === role && (!m || H.m(H.name(el), m))),
  byLabel: (root, m) => H.all(root).filter((el) => {
    if (!H.isControl(el)) return false;
    const label = H.labelText(el);
    return label !== null && H.m(label, m);
  }),
  byPlaceholder: (root, m) => H.all(root).filter((el) => el.hasAttribute('placeholder') && H.m(el.getAttribute('placeholder'), m)),
  byText: (root, m) => H.all(root).filter((el) =>
    !['SCRIPT', 'STYLE', 'HEAD', 'TITLE'].includes(el.tagName)
      && H.m(el.textContent, m)
      && !Array.from(el.children).some((c) => H.m(c.textContent, m))),
  nth: (els, i) => (i < els.length ? [els[i]] : []),
  last: (els) => (els.length ? [els[els.length - 1]] : []),
  within: (scopes, f) => {
    const out = [];
    for (const s of scopes) for (const e of f(s)) if (!out.includes(e)) out.push(e);
    return out;
  },
  has: (els, f) => els.filter((e) => f(e).length > 0),
  setValue: (el, v) => {
    const proto = el.tagName === 'SELECT' ? HTMLSelectElement.prototype
      : el.tagName === 'TEXTAREA' ? HTMLTextAreaElement.prototype : HTMLInputElement.prototype;
    Object.getOwnPropertyDescriptor(proto, 'value').set.call(el, v);
    el.dispatchEvent(new Event('input', { bubbles: true }));
    el.dispatchEvent(new Event('change', { bubbles: true }));
  },
  state: (el) => ({
    visible: H.visible(el),
    text: H.norm(el.innerText !== undefined ? el.innerText : el.textContent),
    value: H.isControl(el) ? String(el.value) : null,
    checked: !!el.checked,
    attributes: Object.fromEntries(Array.from(el.attributes).map((a) => [a.name, a.value])),
    selectedLabel: el.tagName === 'SELECT' && el.selectedIndex >= 0 ? H.norm(el.options[el.selectedIndex].text) : null,
  }),
};"#;

fn wrap(selector: &Selector, body: &str) -> String {
    format!(
        "(() => {{ {QUERY_PRELUDE} const els = {}; {body} }})()",
        selector.to_query("document")
    )
}

/// Number of elements matched
#[must_use]
pub fn count(selector: &Selector) -> String {
    wrap(selector, "return els.length;")
}

/// Snapshot of the `index`-th match, or `null`
#[must_use]
pub fn inspect(selector: &Selector, index: usize) -> String {
    wrap(
        selector,
        &format!("const el = els[{index}]; return el ? H.state(el) : null;"),
    )
}

/// Perform `action` on the `index`-th match. Evaluates to `true` on success,
/// `false` when the element vanished or the action could not apply.
///
/// Clicks are dispatched on the next task so that a native dialog opened
/// by the click does not block the evaluation itself.
#[must_use]
pub fn perform(selector: &Selector, index: usize, action: &ElementAction) -> String {
    let op = match action {
        ElementAction::Click => {
            "setTimeout(() => { el.scrollIntoView({ block: 'center' }); el.click(); }, 0); return true;"
                .to_string()
        }
        ElementAction::Fill(value) => format!(
            "el.focus(); H.setValue(el, {}); return true;",
            serde_json::Value::String(value.clone())
        ),
        ElementAction::SelectOption(label) => format!(
            "if (el.tagName !== 'SELECT') return false; \
             const o = Array.from(el.options).find((o) => H.norm(o.text) === H.norm({})); \
             if (!o) return false; H.setValue(el, o.value); return true;",
            serde_json::Value::String(label.clone())
        ),
    };
    wrap(
        selector,
        &format!("const el = els[{index}]; if (!el) return false; {op}"),
    )
}
