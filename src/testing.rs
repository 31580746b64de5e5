//! In-memory document used by the unit tests.
//!
//! Elements match selectors by exact string: an element declares the selector strings it
//! answers to, and a selector list matches when any of its comma-separated parts is declared.

use std::collections::BTreeMap;
use std::sync::Mutex;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::PageError;
use crate::page::{ElementInfo, NodeRef, Page, SelectOption, ValueEvent};

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Click(NodeRef),
    Focus(NodeRef),
    Input(NodeRef, String),
    Change(NodeRef, String),
    SetValue(NodeRef, String),
    Enter(NodeRef),
    Submit(NodeRef),
    Hover(NodeRef),
    SetAttribute(NodeRef, String, String),
    Remove(NodeRef),
    Navigate(String),
    OpenNew(String),
    Back,
    Forward,
    Reload,
    ScrollBy(f64),
    ScrollTo(f64),
}

#[derive(Debug, Clone)]
pub struct Recorded {
    pub at: Instant,
    pub event: Event,
}

#[derive(Debug, Clone)]
pub enum OnClick {
    /// The page moves to this URL.
    Navigate(String),
    /// The given element (usually the clicked row) leaves the document.
    Detach(NodeRef),
}

#[derive(Debug, Clone, Default)]
pub struct FakeElement {
    tag: String,
    matches: Vec<String>,
    parent: Option<NodeRef>,
    input_type: Option<String>,
    name: Option<String>,
    value: String,
    text: String,
    label: Option<String>,
    href: Option<String>,
    disabled: bool,
    options: Vec<SelectOption>,
    attributes: BTreeMap<String, String>,
    on_click: Option<OnClick>,
    attached: bool,
}

impl FakeElement {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            attached: true,
            ..Default::default()
        }
    }

    pub fn matching(mut self, selectors: &[&str]) -> Self {
        self.matches.extend(selectors.iter().map(|s| s.to_string()));
        self
    }

    pub fn child_of(mut self, parent: NodeRef) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn input_type(mut self, kind: &str) -> Self {
        self.input_type = Some(kind.to_string());
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn value(mut self, value: &str) -> Self {
        self.value = value.to_string();
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn href(mut self, href: &str) -> Self {
        self.href = Some(href.to_string());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    pub fn options(mut self, options: &[(&str, &str)]) -> Self {
        self.options = options
            .iter()
            .map(|(value, text)| SelectOption {
                value: value.to_string(),
                text: text.to_string(),
            })
            .collect();
        self
    }

    pub fn on_click(mut self, effect: OnClick) -> Self {
        self.on_click = Some(effect);
        self
    }
}

#[derive(Debug)]
struct FakeDom {
    url: String,
    title: String,
    elements: Vec<FakeElement>,
    events: Vec<Recorded>,
    history: Vec<String>,
    viewport_height: f64,
    document_height: f64,
    rejected: Vec<String>,
}

impl FakeDom {
    fn element(&self, node: NodeRef) -> Result<&FakeElement, PageError> {
        let el = self
            .elements
            .get(node.0 as usize)
            .ok_or(PageError::Detached(node))?;
        if self.is_attached(node) {
            Ok(el)
        } else {
            Err(PageError::Detached(node))
        }
    }

    fn element_mut(&mut self, node: NodeRef) -> Result<&mut FakeElement, PageError> {
        self.element(node)?;
        Ok(&mut self.elements[node.0 as usize])
    }

    fn is_attached(&self, node: NodeRef) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            match self.elements.get(id.0 as usize) {
                Some(el) if el.attached => current = el.parent,
                _ => return false,
            }
        }
        true
    }

    fn is_below(&self, node: NodeRef, scope: NodeRef) -> bool {
        let mut current = self.elements[node.0 as usize].parent;
        while let Some(id) = current {
            if id == scope {
                return true;
            }
            current = self.elements[id.0 as usize].parent;
        }
        false
    }

    fn record(&mut self, event: Event) {
        self.events.push(Recorded {
            at: Instant::now(),
            event,
        });
    }
}

pub struct FakePage {
    dom: Mutex<FakeDom>,
    changes: watch::Sender<u64>,
}

impl FakePage {
    pub fn new(url: &str) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            dom: Mutex::new(FakeDom {
                url: url.to_string(),
                title: String::new(),
                elements: Vec::new(),
                events: Vec::new(),
                history: vec![url.to_string()],
                viewport_height: 1000.0,
                document_height: 6000.0,
                rejected: Vec::new(),
            }),
            changes,
        }
    }

    pub fn with_title(self, title: &str) -> Self {
        self.lock().title = title.to_string();
        self
    }

    pub fn add(&self, mut element: FakeElement) -> NodeRef {
        element.attached = true;
        let node = {
            let mut dom = self.lock();
            dom.elements.push(element);
            NodeRef(dom.elements.len() as u64 - 1)
        };
        self.touch();
        node
    }

    /// Makes `selector` fail to parse, as a browser does with non-CSS syntax.
    pub fn rejecting(self, selector: &str) -> Self {
        self.lock().rejected.push(selector.to_string());
        self
    }

    pub fn set_url(&self, url: &str) {
        self.lock().url = url.to_string();
    }

    pub fn current_url(&self) -> String {
        self.lock().url.clone()
    }

    pub fn events(&self) -> Vec<Event> {
        self.lock().events.iter().map(|r| r.event.clone()).collect()
    }

    pub fn recorded(&self) -> Vec<Recorded> {
        self.lock().events.clone()
    }

    pub fn clicks(&self) -> Vec<NodeRef> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Click(node) => Some(node),
                _ => None,
            })
            .collect()
    }

    pub fn value_of(&self, node: NodeRef) -> String {
        self.lock().elements[node.0 as usize].value.clone()
    }

    pub fn attribute(&self, node: NodeRef, name: &str) -> Option<String> {
        self.lock().elements[node.0 as usize].attributes.get(name).cloned()
    }

    pub fn is_attached(&self, node: NodeRef) -> bool {
        self.lock().is_attached(node)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeDom> {
        self.dom.lock().unwrap()
    }

    fn touch(&self) {
        self.changes.send_modify(|n| *n += 1);
    }

    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut FakeDom) -> Result<T, PageError>,
    ) -> Result<T, PageError> {
        let out = f(&mut self.lock())?;
        self.touch();
        Ok(out)
    }
}

impl Page for FakePage {
    fn url(&self) -> Result<String, PageError> {
        Ok(self.lock().url.clone())
    }

    fn title(&self) -> Result<String, PageError> {
        Ok(self.lock().title.clone())
    }

    fn query_all(
        &self,
        selector: &str,
        scope: Option<NodeRef>,
    ) -> Result<Vec<NodeRef>, PageError> {
        let dom = self.lock();
        if selector.trim().is_empty() || dom.rejected.iter().any(|r| r == selector) {
            return Err(PageError::InvalidSelector(selector.to_string()));
        }
        if let Some(scope) = scope {
            dom.element(scope)?;
        }
        let parts: Vec<&str> = selector.split(',').map(str::trim).collect();
        Ok((0..dom.elements.len() as u64)
            .map(NodeRef)
            .filter(|node| dom.is_attached(*node))
            .filter(|node| scope.is_none_or(|scope| dom.is_below(*node, scope)))
            .filter(|node| {
                dom.elements[node.0 as usize]
                    .matches
                    .iter()
                    .any(|m| parts.contains(&m.as_str()))
            })
            .collect())
    }

    fn describe(&self, node: NodeRef) -> Result<ElementInfo, PageError> {
        let dom = self.lock();
        let el = dom.element(node)?;
        let has_value = matches!(el.tag.as_str(), "input" | "select" | "textarea");
        Ok(ElementInfo {
            tag: el.tag.clone(),
            input_type: el.input_type.clone(),
            name: el.name.clone(),
            value: (has_value || !el.value.is_empty()).then(|| el.value.clone()),
            text: el.text.trim().to_string(),
            label: el.label.clone(),
            href: el.href.clone(),
            disabled: el.disabled,
            options: el.options.clone(),
        })
    }

    fn closest_form(&self, node: NodeRef) -> Result<Option<NodeRef>, PageError> {
        let dom = self.lock();
        let mut current = dom.element(node)?.parent;
        while let Some(id) = current {
            let el = &dom.elements[id.0 as usize];
            if el.tag == "form" {
                return Ok(Some(id));
            }
            current = el.parent;
        }
        Ok(None)
    }

    fn click(&self, node: NodeRef) -> Result<(), PageError> {
        self.mutate(|dom| {
            let effect = dom.element(node)?.on_click.clone();
            dom.record(Event::Click(node));
            match effect {
                Some(OnClick::Navigate(url)) => {
                    dom.history.push(url.clone());
                    dom.url = url;
                }
                Some(OnClick::Detach(target)) => dom.element_mut(target)?.attached = false,
                None => {}
            }
            Ok(())
        })
    }

    fn focus(&self, node: NodeRef) -> Result<(), PageError> {
        let mut dom = self.lock();
        dom.element(node)?;
        dom.record(Event::Focus(node));
        Ok(())
    }

    fn set_value(&self, node: NodeRef, value: &str, event: ValueEvent) -> Result<(), PageError> {
        self.mutate(|dom| {
            dom.element_mut(node)?.value = value.to_string();
            dom.record(match event {
                ValueEvent::None => Event::SetValue(node, value.to_string()),
                ValueEvent::Input => Event::Input(node, value.to_string()),
                ValueEvent::Change => Event::Change(node, value.to_string()),
            });
            Ok(())
        })
    }

    fn append_char(&self, node: NodeRef, ch: char) -> Result<(), PageError> {
        self.mutate(|dom| {
            let el = dom.element_mut(node)?;
            el.value.push(ch);
            let value = el.value.clone();
            dom.record(Event::Input(node, value));
            Ok(())
        })
    }

    fn press_enter(&self, node: NodeRef) -> Result<(), PageError> {
        let mut dom = self.lock();
        dom.element(node)?;
        dom.record(Event::Enter(node));
        Ok(())
    }

    fn submit_form(&self, form: NodeRef) -> Result<(), PageError> {
        let mut dom = self.lock();
        dom.element(form)?;
        dom.record(Event::Submit(form));
        Ok(())
    }

    fn hover(&self, node: NodeRef) -> Result<(), PageError> {
        let mut dom = self.lock();
        dom.element(node)?;
        dom.record(Event::Hover(node));
        Ok(())
    }

    fn set_attribute(&self, node: NodeRef, name: &str, value: &str) -> Result<(), PageError> {
        self.mutate(|dom| {
            dom.element_mut(node)?
                .attributes
                .insert(name.to_string(), value.to_string());
            dom.record(Event::SetAttribute(node, name.to_string(), value.to_string()));
            Ok(())
        })
    }

    fn remove(&self, node: NodeRef) -> Result<(), PageError> {
        self.mutate(|dom| {
            dom.element_mut(node)?.attached = false;
            dom.record(Event::Remove(node));
            Ok(())
        })
    }

    fn navigate(&self, url: &str) -> Result<(), PageError> {
        self.mutate(|dom| {
            dom.url = url.to_string();
            dom.history.push(url.to_string());
            dom.record(Event::Navigate(url.to_string()));
            Ok(())
        })
    }

    fn open_in_new_context(&self, url: &str) -> Result<(), PageError> {
        self.lock().record(Event::OpenNew(url.to_string()));
        Ok(())
    }

    fn history_back(&self) -> Result<(), PageError> {
        self.mutate(|dom| {
            if dom.history.len() > 1 {
                dom.history.pop();
                if let Some(previous) = dom.history.last() {
                    dom.url = previous.clone();
                }
            }
            dom.record(Event::Back);
            Ok(())
        })
    }

    fn history_forward(&self) -> Result<(), PageError> {
        self.lock().record(Event::Forward);
        Ok(())
    }

    fn reload(&self) -> Result<(), PageError> {
        self.mutate(|dom| {
            dom.record(Event::Reload);
            Ok(())
        })
    }

    fn viewport_height(&self) -> Result<f64, PageError> {
        Ok(self.lock().viewport_height)
    }

    fn document_height(&self) -> Result<f64, PageError> {
        Ok(self.lock().document_height)
    }

    fn scroll_by(&self, delta_y: f64) -> Result<(), PageError> {
        self.lock().record(Event::ScrollBy(delta_y));
        Ok(())
    }

    fn scroll_to(&self, top: f64) -> Result<(), PageError> {
        self.lock().record(Event::ScrollTo(top));
        Ok(())
    }

    fn changes(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }
}
