use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use headless_chrome::Tab;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::watch;
use tracing::debug;
use voice_cart::{ElementInfo, NodeRef, Page, PageError, ValueEvent};

/// How often the poller samples the page's mutation counter.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Installed into every document on first use. Elements handed to Rust are tagged with a
/// `data-vc-ref` id; ids start from the install time so a reference taken before a
/// navigation never names an element of the next document.
///
/// Every helper returns a JSON string: `{"ok": value}`, `"detached"`, `{"selector": msg}`
/// or `{"failed": msg}`.
const PRELUDE: &str = r#"
(() => {
  if (window.__vc) return;
  let next = Date.now() * 1000;
  const vc = { mutations: 0 };
  const ok = v => JSON.stringify({ ok: v === undefined ? null : v });
  const refOf = el => {
    let id = el.getAttribute('data-vc-ref');
    if (!id) { id = String(next++); el.setAttribute('data-vc-ref', id); }
    return Number(id);
  };
  const byRef = id => document.querySelector('[data-vc-ref="' + id + '"]');
  const labelOf = el => {
    if (el.labels && el.labels.length) return el.labels[0].textContent.trim();
    const sib = el.nextElementSibling;
    return sib ? sib.textContent.trim() : null;
  };
  vc.run = (fn, ...ids) => {
    const els = [];
    for (const id of ids) {
      if (id === null) { els.push(null); continue; }
      const el = byRef(id);
      if (!el) return JSON.stringify('detached');
      els.push(el);
    }
    try { return ok(fn(...els)); }
    catch (e) {
      if (e instanceof DOMException && e.name === 'SyntaxError') return JSON.stringify({ selector: e.message });
      return JSON.stringify({ failed: String(e && e.message || e) });
    }
  };
  vc.query = (selector, scope) => [...(scope || document).querySelectorAll(selector)].map(refOf);
  vc.describe = el => ({
    tag: el.tagName.toLowerCase(),
    inputType: el.type || null,
    name: el.getAttribute('name'),
    value: 'value' in el ? String(el.value) : null,
    text: (el.innerText || el.textContent || '').trim(),
    label: labelOf(el),
    href: el.getAttribute('href'),
    disabled: !!el.disabled || el.getAttribute('aria-disabled') === 'true',
    options: el.options ? [...el.options].map(o => ({ value: o.value, text: o.text.trim() })) : [],
  });
  vc.closestForm = el => { const f = el.closest('form'); return f ? refOf(f) : null; };
  vc.fire = (el, type) => el.dispatchEvent(new Event(type, { bubbles: true }));
  vc.setValue = (el, value, event) => { el.value = value; if (event) vc.fire(el, event); };
  vc.appendChar = (el, ch) => { el.value += ch; vc.fire(el, 'input'); };
  vc.pressEnter = el => {
    for (const type of ['keydown', 'keypress', 'keyup']) {
      el.dispatchEvent(new KeyboardEvent(type, { key: 'Enter', code: 'Enter', keyCode: 13, bubbles: true }));
    }
  };
  vc.submit = form => form.requestSubmit ? form.requestSubmit() : form.submit();
  vc.hover = el => {
    el.dispatchEvent(new MouseEvent('mouseenter', { bubbles: true }));
    el.dispatchEvent(new MouseEvent('mouseover', { bubbles: true }));
  };
  new MutationObserver(() => { vc.mutations += 1; })
    .observe(document, { childList: true, subtree: true, attributes: true, characterData: true });
  window.__vc = vc;
})();
"#;

#[derive(Deserialize)]
#[serde(rename_all = "lowercase")]
enum Reply<T> {
    Ok(T),
    Detached,
    Selector(String),
    Failed(String),
}

/// A JavaScript string literal for `text`.
fn js(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| "\"\"".to_string())
}

fn js_ref(node: Option<NodeRef>) -> String {
    node.map_or_else(|| "null".to_string(), |n| n.0.to_string())
}

/// [`Page`] over a Chrome tab. Every call evaluates a small script against the live document.
pub struct ChromePage {
    tab: Arc<Tab>,
    changes: Arc<watch::Sender<u64>>,
    stop: Arc<AtomicBool>,
}

impl ChromePage {
    pub fn new(tab: Arc<Tab>) -> Self {
        let (changes, _) = watch::channel(0);
        let page = Self {
            tab,
            changes: Arc::new(changes),
            stop: Arc::new(AtomicBool::new(false)),
        };
        page.spawn_poller();
        page
    }

    /// Forwards URL changes and DOM mutations into the change feed.
    fn spawn_poller(&self) {
        let tab = self.tab.clone();
        let changes = self.changes.clone();
        let stop = self.stop.clone();
        let script = format!(
            "{PRELUDE}\nJSON.stringify([location.href, window.__vc ? window.__vc.mutations : 0])"
        );
        thread::spawn(move || {
            let mut last: Option<(String, u64)> = None;
            while !stop.load(Ordering::Relaxed) {
                let sample = tab
                    .evaluate(&script, false)
                    .ok()
                    .and_then(|out| out.value)
                    .and_then(|v| v.as_str().map(String::from))
                    .and_then(|raw| serde_json::from_str::<(String, u64)>(&raw).ok());
                if let Some(sample) = sample {
                    if last.as_ref() != Some(&sample) {
                        changes.send_modify(|tick| *tick += 1);
                        last = Some(sample);
                    }
                }
                thread::sleep(POLL_INTERVAL);
            }
            debug!("change poller stopped");
        });
    }

    fn eval(&self, expression: &str) -> Result<Value, PageError> {
        let script = format!("{PRELUDE}\n{expression}");
        let out = self
            .tab
            .evaluate(&script, false)
            .map_err(|e| PageError::Script(e.to_string()))?;
        Ok(out.value.unwrap_or(Value::Null))
    }

    /// Runs `body` (a JS function over the resolved elements) through the prelude's error
    /// handling and decodes its result.
    fn call<T: DeserializeOwned>(
        &self,
        body: &str,
        nodes: &[Option<NodeRef>],
        selector: Option<&str>,
    ) -> Result<T, PageError> {
        let ids: Vec<String> = nodes.iter().map(|n| js_ref(*n)).collect();
        let mut args = vec![body.to_string()];
        args.extend(ids);
        let raw = self.eval(&format!("window.__vc.run({})", args.join(", ")))?;
        let text = raw
            .as_str()
            .ok_or_else(|| PageError::Script(format!("unexpected script result {raw}")))?;
        let reply: Reply<T> =
            serde_json::from_str(text).map_err(|e| PageError::Script(e.to_string()))?;
        match reply {
            Reply::Ok(value) => Ok(value),
            Reply::Detached => {
                let node = nodes.iter().flatten().next().copied().unwrap_or(NodeRef(0));
                Err(PageError::Detached(node))
            }
            Reply::Selector(message) => {
                debug!(reason = message.as_str(), "selector rejected");
                Err(PageError::InvalidSelector(selector.unwrap_or_default().to_string()))
            }
            Reply::Failed(message) => Err(PageError::Script(message)),
        }
    }

    fn act(&self, node: NodeRef, body: &str) -> Result<(), PageError> {
        self.call::<Value>(body, &[Some(node)], None).map(|_| ())
    }

    fn window(&self, expression: &str) -> Result<(), PageError> {
        self.call::<Value>(&format!("() => {{ {expression}; }}"), &[], None)
            .map(|_| ())
    }

    fn number(&self, expression: &str) -> Result<f64, PageError> {
        self.call(&format!("() => {expression}"), &[], None)
    }
}

impl Drop for ChromePage {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

impl Page for ChromePage {
    fn url(&self) -> Result<String, PageError> {
        self.call("() => location.href", &[], None)
    }

    fn title(&self) -> Result<String, PageError> {
        self.call("() => document.title", &[], None)
    }

    fn query_all(&self, selector: &str, scope: Option<NodeRef>) -> Result<Vec<NodeRef>, PageError> {
        let body = format!("scope => window.__vc.query({}, scope)", js(selector));
        let ids: Vec<u64> = self.call(&body, &[scope], Some(selector))?;
        Ok(ids.into_iter().map(NodeRef).collect())
    }

    fn describe(&self, node: NodeRef) -> Result<ElementInfo, PageError> {
        self.call("el => window.__vc.describe(el)", &[Some(node)], None)
    }

    fn closest_form(&self, node: NodeRef) -> Result<Option<NodeRef>, PageError> {
        let id: Option<u64> = self.call("el => window.__vc.closestForm(el)", &[Some(node)], None)?;
        Ok(id.map(NodeRef))
    }

    fn click(&self, node: NodeRef) -> Result<(), PageError> {
        self.act(node, "el => el.click()")
    }

    fn focus(&self, node: NodeRef) -> Result<(), PageError> {
        self.act(node, "el => el.focus()")
    }

    fn set_value(&self, node: NodeRef, value: &str, event: ValueEvent) -> Result<(), PageError> {
        let event = match event {
            ValueEvent::None => "null",
            ValueEvent::Input => "'input'",
            ValueEvent::Change => "'change'",
        };
        self.act(
            node,
            &format!("el => window.__vc.setValue(el, {}, {event})", js(value)),
        )
    }

    fn append_char(&self, node: NodeRef, ch: char) -> Result<(), PageError> {
        let mut buf = [0u8; 4];
        let ch = js(ch.encode_utf8(&mut buf));
        self.act(node, &format!("el => window.__vc.appendChar(el, {ch})"))
    }

    fn press_enter(&self, node: NodeRef) -> Result<(), PageError> {
        self.act(node, "el => window.__vc.pressEnter(el)")
    }

    fn submit_form(&self, form: NodeRef) -> Result<(), PageError> {
        self.act(form, "form => window.__vc.submit(form)")
    }

    fn hover(&self, node: NodeRef) -> Result<(), PageError> {
        self.act(node, "el => window.__vc.hover(el)")
    }

    fn set_attribute(&self, node: NodeRef, name: &str, value: &str) -> Result<(), PageError> {
        self.act(
            node,
            &format!("el => el.setAttribute({}, {})", js(name), js(value)),
        )
    }

    fn remove(&self, node: NodeRef) -> Result<(), PageError> {
        self.act(node, "el => el.remove()")
    }

    fn navigate(&self, url: &str) -> Result<(), PageError> {
        debug!(url, "navigating");
        self.tab
            .navigate_to(url)
            .and_then(|tab| tab.wait_until_navigated())
            .map_err(|e| PageError::Script(format!("navigation to {url} failed: {e}")))?;
        Ok(())
    }

    fn open_in_new_context(&self, url: &str) -> Result<(), PageError> {
        self.window(&format!("window.open({}, '_blank')", js(url)))
    }

    fn history_back(&self) -> Result<(), PageError> {
        self.window("history.back()")
    }

    fn history_forward(&self) -> Result<(), PageError> {
        self.window("history.forward()")
    }

    fn reload(&self) -> Result<(), PageError> {
        self.window("location.reload()")
    }

    fn viewport_height(&self) -> Result<f64, PageError> {
        self.number("window.innerHeight")
    }

    fn document_height(&self) -> Result<f64, PageError> {
        self.number("document.documentElement.scrollHeight")
    }

    fn scroll_by(&self, delta_y: f64) -> Result<(), PageError> {
        self.window(&format!("window.scrollBy({{ top: {delta_y}, behavior: 'smooth' }})"))
    }

    fn scroll_to(&self, top: f64) -> Result<(), PageError> {
        self.window(&format!("window.scrollTo({{ top: {top}, behavior: 'smooth' }})"))
    }

    fn changes(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_literals_are_escaped() {
        assert_eq!(js(r#"input[name="q"]"#), r#""input[name=\"q\"]""#);
        assert_eq!(js("it's\n"), r#""it's\n""#);
        assert_eq!(js_ref(Some(NodeRef(42))), "42");
        assert_eq!(js_ref(None), "null");
    }

    #[test]
    fn replies_decode_every_outcome() {
        let ok: Reply<Vec<u64>> = serde_json::from_str(r#"{"ok":[1,2]}"#).expect("ok");
        assert!(matches!(ok, Reply::Ok(ids) if ids == vec![1, 2]));
        let detached: Reply<Value> = serde_json::from_str(r#""detached""#).expect("detached");
        assert!(matches!(detached, Reply::Detached));
        let bad: Reply<Value> = serde_json::from_str(r#"{"selector":"not valid"}"#).expect("selector");
        assert!(matches!(bad, Reply::Selector(_)));
    }
}
