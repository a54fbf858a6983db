//! Tree presentation of the element store.
//!
//! The presenter never caches nodes. Every call to [`TreePresenter::children`]
//! recomputes the requested level from the store, so a node whose backing
//! elements disappeared simply expands to nothing.

use std::cell::Cell;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde::Serialize;

use crate::app::store::{ElementStore, SubscriptionId};
use crate::domain::model::{DocumentId, Element, ElementKind, Span};

/// Label shown for separator rows.
pub const SEPARATOR_LABEL: &str = "——————————";

/// Runtime-toggleable presentation settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ViewOptions {
    /// Root level lists files instead of declaration kinds.
    pub group_by_file: bool,
    /// Leaves sort by originating file first and get separators between files.
    pub sort_by_file: bool,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            group_by_file: false,
            sort_by_file: true,
        }
    }
}

/// Coarse node classification exposed to hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeTag {
    Category,
    Group,
    File,
    Element,
    Separator,
}

/// Where the host should navigate when a leaf is activated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Activation {
    pub document: DocumentId,
    pub span: Span,
}

/// Leaf wrapping exactly one element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementLeaf {
    element: Element,
    tooltip: String,
}

impl ElementLeaf {
    fn new(element: Element, roots: &[PathBuf]) -> Self {
        let file = relative_to_roots(element.document.path(), roots)
            .unwrap_or_else(|| element.document.file_name());
        let tooltip = format!(
            "{}: {}\nFile: {}\nLine: {}",
            element.kind.label(),
            element.name,
            file,
            element.span.display_line()
        );
        Self { element, tooltip }
    }

    pub fn element(&self) -> &Element {
        &self.element
    }

    /// Secondary text: file name plus 1-based line.
    pub fn description(&self) -> String {
        format!(
            "{} ({})",
            self.element.document.file_name(),
            self.element.span.display_line()
        )
    }
}

/// One node of the presented hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeNode {
    /// Root bucket for one declaration kind.
    Category { kind: ElementKind },
    /// Root bucket for one document when grouping by file.
    FileGroup {
        document: DocumentId,
        datapacks: usize,
        functions: usize,
    },
    /// Intermediate bucket for a `/`-delimited name prefix.
    PathGroup { kind: ElementKind, prefix: String },
    Element(ElementLeaf),
    Separator,
}

impl TreeNode {
    pub fn tag(&self) -> NodeTag {
        match self {
            TreeNode::Category { .. } => NodeTag::Category,
            TreeNode::FileGroup { .. } => NodeTag::File,
            TreeNode::PathGroup { .. } => NodeTag::Group,
            TreeNode::Element(_) => NodeTag::Element,
            TreeNode::Separator => NodeTag::Separator,
        }
    }

    pub fn label(&self) -> String {
        match self {
            TreeNode::Category { kind } => kind.category_label().to_owned(),
            TreeNode::FileGroup { document, .. } => document.file_name(),
            TreeNode::PathGroup { prefix, .. } => prefix
                .rsplit_once('/')
                .map_or(prefix.as_str(), |(_, last)| last)
                .to_owned(),
            TreeNode::Element(leaf) => leaf.element.display_name().to_owned(),
            TreeNode::Separator => SEPARATOR_LABEL.to_owned(),
        }
    }

    pub fn description(&self) -> Option<String> {
        match self {
            TreeNode::Element(leaf) => Some(leaf.description()),
            _ => None,
        }
    }

    pub fn tooltip(&self) -> String {
        match self {
            TreeNode::Category { kind } => {
                format!("{} defined in the workspace", kind.category_label())
            }
            TreeNode::FileGroup {
                document,
                datapacks,
                functions,
            } => format!(
                "File: {}\nDatapacks: {}\nFunctions: {}\nTotal elements: {}",
                document.file_name(),
                datapacks,
                functions,
                datapacks + functions
            ),
            TreeNode::PathGroup { kind, prefix } => format!("{} group: {}", kind.label(), prefix),
            TreeNode::Element(leaf) => leaf.tooltip.clone(),
            TreeNode::Separator => String::new(),
        }
    }

    pub fn activation(&self) -> Option<Activation> {
        match self {
            TreeNode::Element(leaf) => Some(Activation {
                document: leaf.element.document.clone(),
                span: leaf.element.span,
            }),
            _ => None,
        }
    }

    /// Host-side key for remembering expansion state across refreshes.
    pub fn key(&self) -> String {
        match self {
            TreeNode::Category { kind } => format!("category:{kind}"),
            TreeNode::FileGroup { document, .. } => format!("file:{document}"),
            TreeNode::PathGroup { kind, prefix } => format!("group:{kind}:{prefix}"),
            TreeNode::Element(leaf) => format!(
                "element:{}:{}:{}:{}:{}",
                leaf.element.kind,
                leaf.element.document,
                leaf.element.name,
                leaf.element.span.start.line,
                leaf.element.span.start.column
            ),
            TreeNode::Separator => "separator".to_owned(),
        }
    }

    pub fn is_expandable(&self) -> bool {
        matches!(
            self,
            TreeNode::Category { .. } | TreeNode::FileGroup { .. } | TreeNode::PathGroup { .. }
        )
    }

    fn is_group(&self) -> bool {
        matches!(self, TreeNode::FileGroup { .. } | TreeNode::PathGroup { .. })
    }

    fn leaf(&self) -> Option<&ElementLeaf> {
        match self {
            TreeNode::Element(leaf) => Some(leaf),
            _ => None,
        }
    }
}

/// A node together with its fully materialized children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeItem {
    pub node: TreeNode,
    pub children: Vec<TreeItem>,
}

impl Serialize for TreeItem {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct View<'a> {
            label: String,
            tag: NodeTag,
            #[serde(skip_serializing_if = "Option::is_none")]
            description: Option<String>,
            tooltip: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            activation: Option<Activation>,
            #[serde(skip_serializing_if = "is_leaf_level")]
            children: &'a [TreeItem],
        }

        fn is_leaf_level(children: &&[TreeItem]) -> bool {
            children.is_empty()
        }

        View {
            label: self.node.label(),
            tag: self.node.tag(),
            description: self.node.description(),
            tooltip: self.node.tooltip(),
            activation: self.node.activation(),
            children: &self.children,
        }
        .serialize(serializer)
    }
}

/// Derives navigable trees from an [`ElementStore`].
#[derive(Debug)]
pub struct TreePresenter {
    options: ViewOptions,
    roots: Vec<PathBuf>,
    stale: Rc<Cell<bool>>,
    subscription: Option<SubscriptionId>,
}

impl TreePresenter {
    /// Create a presenter that is not yet listening to any store.
    pub fn new(options: ViewOptions) -> Self {
        Self {
            options,
            roots: Vec::new(),
            stale: Rc::new(Cell::new(true)),
            subscription: None,
        }
    }

    /// Create a presenter that marks itself stale whenever `store` changes.
    pub fn attach(store: &mut ElementStore, options: ViewOptions) -> Self {
        let mut presenter = Self::new(options);
        let stale = presenter.stale.clone();
        presenter.subscription = Some(store.subscribe(move || stale.set(true)));
        presenter
    }

    /// Stop listening to `store`.
    pub fn detach(&mut self, store: &mut ElementStore) {
        if let Some(id) = self.subscription.take() {
            store.unsubscribe(id);
        }
    }

    /// Workspace roots used to shorten paths in tooltips.
    pub fn with_workspace_roots(mut self, roots: Vec<PathBuf>) -> Self {
        self.roots = roots;
        self
    }

    pub fn options(&self) -> ViewOptions {
        self.options
    }

    pub fn set_group_by_file(&mut self, value: bool) {
        self.options.group_by_file = value;
        self.mark_stale();
    }

    pub fn set_sort_by_file(&mut self, value: bool) {
        self.options.sort_by_file = value;
        self.mark_stale();
    }

    pub fn mark_stale(&self) {
        self.stale.set(true);
    }

    pub fn is_stale(&self) -> bool {
        self.stale.get()
    }

    /// Return whether a refresh is pending and clear the flag.
    pub fn take_stale(&self) -> bool {
        self.stale.replace(false)
    }

    /// Children of `parent`, or the root level when `parent` is `None`.
    pub fn children(&self, store: &ElementStore, parent: Option<&TreeNode>) -> Vec<TreeNode> {
        match parent {
            None if self.options.group_by_file => self.file_roots(store),
            None => kind_roots(store),
            Some(TreeNode::Category { kind }) => {
                self.partition(store.list_by_kind(*kind), *kind, None)
            }
            Some(TreeNode::PathGroup { kind, prefix }) => {
                self.partition(store.list_by_kind(*kind), *kind, Some(prefix))
            }
            Some(TreeNode::FileGroup { document, .. }) => {
                let leaves = store
                    .list_by_document(document)
                    .into_iter()
                    .map(|element| TreeNode::Element(ElementLeaf::new(element, &self.roots)))
                    .collect();
                self.arrange(leaves)
            }
            Some(TreeNode::Element(_)) | Some(TreeNode::Separator) => Vec::new(),
        }
    }

    /// Materialize the whole tree.
    pub fn build(&self, store: &ElementStore) -> Vec<TreeItem> {
        self.build_level(store, None)
    }

    fn build_level(&self, store: &ElementStore, parent: Option<&TreeNode>) -> Vec<TreeItem> {
        self.children(store, parent)
            .into_iter()
            .map(|node| {
                let children = if node.is_expandable() {
                    self.build_level(store, Some(&node))
                } else {
                    Vec::new()
                };
                TreeItem { node, children }
            })
            .collect()
    }

    fn file_roots(&self, store: &ElementStore) -> Vec<TreeNode> {
        let all = store.list();
        let mut files: Vec<TreeNode> = store
            .documents()
            .into_iter()
            .map(|document| {
                let count = |kind| {
                    all.iter()
                        .filter(|e| e.kind == kind && e.document == document)
                        .count()
                };
                TreeNode::FileGroup {
                    datapacks: count(ElementKind::DataPack),
                    functions: count(ElementKind::Function),
                    document,
                }
            })
            .collect();
        files.sort_by(|a, b| self.compare(a, b));
        files
    }

    /// Split `elements` into direct leaves and next-segment groups below `prefix`.
    fn partition(
        &self,
        elements: Vec<Element>,
        kind: ElementKind,
        prefix: Option<&str>,
    ) -> Vec<TreeNode> {
        let mut nodes = Vec::new();
        let mut segments: Vec<String> = Vec::new();

        for element in elements {
            let relative = match prefix {
                None => element.name.as_str(),
                Some(prefix) => match element
                    .name
                    .strip_prefix(prefix)
                    .and_then(|rest| rest.strip_prefix('/'))
                {
                    Some(rest) => rest,
                    None => continue,
                },
            };

            match relative.split_once('/') {
                None => nodes.push(TreeNode::Element(ElementLeaf::new(
                    element.clone(),
                    &self.roots,
                ))),
                Some((segment, _)) => {
                    if !segments.iter().any(|existing| existing == segment) {
                        segments.push(segment.to_owned());
                    }
                }
            }
        }

        nodes.extend(segments.into_iter().map(|segment| TreeNode::PathGroup {
            kind,
            prefix: match prefix {
                Some(prefix) => format!("{prefix}/{segment}"),
                None => segment,
            },
        }));

        self.arrange(nodes)
    }

    /// Sort siblings and insert file separators where the mode asks for them.
    fn arrange(&self, mut nodes: Vec<TreeNode>) -> Vec<TreeNode> {
        nodes.sort_by(|a, b| self.compare(a, b));
        if !self.options.sort_by_file {
            return nodes;
        }

        let mut arranged = Vec::with_capacity(nodes.len());
        let mut current: Option<DocumentId> = None;
        for node in nodes {
            if let Some(leaf) = node.leaf() {
                let document = &leaf.element.document;
                if current.as_ref().is_some_and(|seen| seen != document) {
                    arranged.push(TreeNode::Separator);
                }
                current = Some(document.clone());
            }
            arranged.push(node);
        }
        arranged
    }

    fn compare(&self, a: &TreeNode, b: &TreeNode) -> Ordering {
        match (a.is_group(), b.is_group()) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (true, true) => a
                .label()
                .cmp(&b.label())
                .then_with(|| group_path(a).cmp(&group_path(b))),
            (false, false) => match (a.leaf(), b.leaf()) {
                (Some(a), Some(b)) => self.compare_leaves(&a.element, &b.element),
                _ => Ordering::Equal,
            },
        }
    }

    fn compare_leaves(&self, a: &Element, b: &Element) -> Ordering {
        let by_file = if self.options.sort_by_file {
            a.document.path().cmp(b.document.path())
        } else {
            Ordering::Equal
        };
        by_file
            .then_with(|| a.kind.cmp(&b.kind))
            .then_with(|| a.display_name().cmp(b.display_name()))
    }
}

fn kind_roots(store: &ElementStore) -> Vec<TreeNode> {
    ElementKind::ALL
        .into_iter()
        .filter(|kind| !store.list_by_kind(*kind).is_empty())
        .map(|kind| TreeNode::Category { kind })
        .collect()
}

fn group_path(node: &TreeNode) -> Option<&Path> {
    match node {
        TreeNode::FileGroup { document, .. } => Some(document.path()),
        _ => None,
    }
}

fn relative_to_roots(path: &Path, roots: &[PathBuf]) -> Option<String> {
    roots.iter().find_map(|root| {
        path.strip_prefix(root)
            .ok()
            .filter(|rest| !rest.as_os_str().is_empty())
            .map(|rest| rest.display().to_string())
    })
}

/// Collect every leaf element of a materialized tree in display order.
pub fn leaf_elements(items: &[TreeItem]) -> Vec<&Element> {
    let mut leaves = Vec::new();
    collect_leaves(items, &mut leaves);
    leaves
}

fn collect_leaves<'a>(items: &'a [TreeItem], out: &mut Vec<&'a Element>) {
    for item in items {
        if let Some(leaf) = item.node.leaf() {
            out.push(&leaf.element);
        }
        collect_leaves(&item.children, out);
    }
}
