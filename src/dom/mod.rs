//! Arena node tree of a specification document
//!
//! Nodes live in one vector owned by the [`Document`] and refer to each other
//! by [`NodeId`]. Detached nodes stay in the arena until the document is
//! dropped. Element and attribute names are matched case-insensitively.

use std::fmt;

mod reader;
mod writer;

/// Index of a node within its [`Document`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// The root of a document
    Document,
    Element {
        name: String,
        attributes: Vec<Attribute>,
    },
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Creates a document holding only its root node
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::Document,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// The first element child of the root
    pub fn document_element(&self) -> Option<NodeId> {
        self.element_children(self.root()).next()
    }

    fn add(&mut self, kind: NodeKind) -> NodeId {
        self.nodes.push(Node {
            kind,
            parent: None,
            children: Vec::new(),
        });
        NodeId(self.nodes.len() - 1)
    }

    pub fn create_element<N: Into<String>>(&mut self, name: N) -> NodeId {
        self.add(NodeKind::Element {
            name: name.into(),
            attributes: Vec::new(),
        })
    }

    pub fn create_text<T: Into<String>>(&mut self, text: T) -> NodeId {
        self.add(NodeKind::Text(text.into()))
    }

    pub fn create_comment<T: Into<String>>(&mut self, text: T) -> NodeId {
        self.add(NodeKind::Comment(text.into()))
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn element_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(|&child| self.name(child).is_some())
    }

    /// The first element child named `name`
    pub fn child_element(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.element_children(id).find(|&child| self.is_element(child, name))
    }

    /// The tag name of an element
    pub fn name(&self, id: NodeId) -> Option<&str> {
        match self.kind(id) {
            NodeKind::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn is_element(&self, id: NodeId, name: &str) -> bool {
        self.name(id).map_or(false, |n| n.eq_ignore_ascii_case(name))
    }

    pub fn attributes(&self, id: NodeId) -> &[Attribute] {
        match self.kind(id) {
            NodeKind::Element { attributes, .. } => attributes,
            _ => &[],
        }
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.attributes(id)
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
            .map(|a| a.value.as_str())
    }

    /// The value of an attribute, unless it is missing or empty
    pub fn non_empty_attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.attribute(id, name).filter(|v| !v.is_empty())
    }

    /// Sets an attribute of an element, replacing any attribute of the same name
    ///
    /// A replaced attribute keeps its position and takes the new spelling of
    /// the name. Does nothing on non-elements.
    pub fn set_attribute<N: Into<String>, V: Into<String>>(&mut self, id: NodeId, name: N, value: V) {
        let (name, value) = (name.into(), value.into());
        if let NodeKind::Element { attributes, .. } = &mut self.nodes[id.0].kind {
            match attributes
                .iter_mut()
                .find(|a| a.name.eq_ignore_ascii_case(&name))
            {
                Some(attribute) => {
                    attribute.name = name;
                    attribute.value = value;
                }
                None => attributes.push(Attribute { name, value }),
            }
        }
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> Option<String> {
        match &mut self.nodes[id.0].kind {
            NodeKind::Element { attributes, .. } => {
                let pos = attributes
                    .iter()
                    .position(|a| a.name.eq_ignore_ascii_case(name))?;
                Some(attributes.remove(pos).value)
            }
            _ => None,
        }
    }

    /// Appends `child` to `parent`, detaching it from its current parent first
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Removes `id` from its parent
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != id);
        }
    }

    /// Puts `new` in the place of `old`, which ends up detached
    pub fn replace(&mut self, old: NodeId, new: NodeId) {
        let Some(parent) = self.nodes[old.0].parent else {
            return;
        };
        self.detach(new);
        if let Some(slot) = self.nodes[parent.0].children.iter_mut().find(|c| **c == old) {
            *slot = new;
        }
        self.nodes[new.0].parent = Some(parent);
        self.nodes[old.0].parent = None;
    }

    /// Returns true if `id` is still reachable from the root
    pub fn is_attached(&self, mut id: NodeId) -> bool {
        while let Some(parent) = self.parent(id) {
            id = parent;
        }
        id == self.root()
    }

    /// All text below `id`, concatenated in document order
    pub fn text_content(&self, id: NodeId) -> String {
        let mut text = String::new();
        self.collect_text(id, &mut text);
        text
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match self.kind(id) {
            NodeKind::Text(t) => out.push_str(t),
            NodeKind::Comment(_) => {}
            NodeKind::Document | NodeKind::Element { .. } => {
                for &child in self.children(id) {
                    self.collect_text(child, out);
                }
            }
        }
    }
}
