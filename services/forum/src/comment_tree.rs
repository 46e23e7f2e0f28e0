//! Flat comment list to parent/children forest
//!
//! Comments are sorted newest first once. Every comment whose parent is in the
//! fetched set goes under that parent, in sorted order; the rest are roots.
//! Nodes live in one arena and refer to their children by index, so building,
//! walking, cloning and dropping never recurse on reply depth.

use std::collections::{HashMap, HashSet};

use crate::models::{Comment, CommentId, UserId};

/// A comment with the arena indices of its replies
#[derive(Debug, Clone, PartialEq)]
pub struct CommentNode {
    pub comment: Comment,
    pub liked_by_user: bool,
    pub children: Vec<usize>,
}

impl CommentNode {
    pub fn id(&self) -> CommentId {
        self.comment.id
    }
}

/// Fully materialised comment forest of one thread
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommentForest {
    nodes: Vec<CommentNode>,
    roots: Vec<usize>,
    index: HashMap<CommentId, usize>,
}

impl CommentForest {
    /// Build the forest for `viewer` from comments in any order
    pub fn build(comments: Vec<Comment>, viewer: Option<UserId>) -> Self {
        let mut sorted = comments;
        // stable: equal timestamps keep backend order
        sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let mut seen = HashSet::new();
        sorted.retain(|c| seen.insert(c.id));

        let index: HashMap<CommentId, usize> =
            sorted.iter().enumerate().map(|(i, c)| (c.id, i)).collect();

        let mut candidates: Vec<Vec<usize>> = vec![Vec::new(); sorted.len()];
        let mut top = Vec::new();
        for (i, comment) in sorted.iter().enumerate() {
            match comment
                .parent_comment_id
                .and_then(|parent| index.get(&parent))
            {
                Some(&parent) if parent != i => candidates[parent].push(i),
                _ => top.push(i),
            }
        }

        let mut placed = vec![false; sorted.len()];
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); sorted.len()];
        let mut roots = Vec::with_capacity(top.len());
        let mut stack = Vec::new();

        // Anything the roots don't reach hangs off a parent cycle; it is
        // promoted in sorted order once the real roots are placed.
        let starts = top.into_iter().chain(0..sorted.len());
        for start in starts {
            if placed[start] {
                continue;
            }
            placed[start] = true;
            roots.push(start);
            stack.push(start);
            while let Some(at) = stack.pop() {
                for &child in &candidates[at] {
                    if !placed[child] {
                        placed[child] = true;
                        children[at].push(child);
                        stack.push(child);
                    }
                }
            }
        }

        let nodes = sorted
            .into_iter()
            .zip(children)
            .map(|(comment, children)| CommentNode {
                liked_by_user: viewer.is_some_and(|v| comment.liked_by(v)),
                comment,
                children,
            })
            .collect();

        Self {
            nodes,
            roots,
            index,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Total number of comments in the forest
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn roots(&self) -> impl Iterator<Item = &CommentNode> + '_ {
        self.roots.iter().map(|&i| &self.nodes[i])
    }

    pub fn children<'a>(&'a self, node: &'a CommentNode) -> impl Iterator<Item = &'a CommentNode> {
        node.children.iter().map(|&i| &self.nodes[i])
    }

    /// Depth-first, pre-order walk as `(depth, node)` pairs
    pub fn flatten(&self) -> Vec<(usize, &CommentNode)> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<(usize, usize)> = self.roots.iter().rev().map(|&i| (0, i)).collect();
        while let Some((depth, i)) = stack.pop() {
            let node = &self.nodes[i];
            out.push((depth, node));
            stack.extend(node.children.iter().rev().map(|&child| (depth + 1, child)));
        }
        out
    }

    pub fn find(&self, id: CommentId) -> Option<&CommentNode> {
        self.index.get(&id).map(|&i| &self.nodes[i])
    }

    pub fn contains(&self, id: CommentId) -> bool {
        self.index.contains_key(&id)
    }
}
