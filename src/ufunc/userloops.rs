//! Loops registered for user-defined types
//!
//! Each user type owns a capsule holding the head of a singly-linked chain of
//! [`Loop1d`] nodes. Capsules are kept in registration order.

use super::{LoopData, LoopFn};
use crate::dtype::TypeNum;
use indexmap::IndexMap;

/// One user-registered loop
pub struct Loop1d {
    func: LoopFn,
    data: LoopData,
    arg_types: Vec<TypeNum>,
    next: Option<Box<Loop1d>>,
}

impl Loop1d {
    #[inline]
    pub fn func(&self) -> LoopFn {
        self.func
    }

    #[inline]
    pub fn data(&self) -> LoopData {
        self.data
    }

    /// Argument types, external order (inputs, output)
    #[inline]
    pub fn arg_types(&self) -> &[TypeNum] {
        &self.arg_types
    }

    /// Next loop registered for the same user type
    #[inline]
    pub fn next(&self) -> Option<&Loop1d> {
        self.next.as_deref()
    }
}

/// Owner of a chain of [`Loop1d`] nodes
#[derive(Default)]
pub struct LoopCapsule {
    head: Option<Box<Loop1d>>,
}

impl LoopCapsule {
    /// First loop of the chain; `None` for an empty capsule
    pub fn head(&self) -> Option<&Loop1d> {
        self.head.as_deref()
    }

    /// Walk the chain head to tail
    pub fn iter(&self) -> impl Iterator<Item = &Loop1d> {
        std::iter::successors(self.head(), |node| node.next())
    }

    fn insert(&mut self, func: LoopFn, arg_types: Vec<TypeNum>, data: LoopData) {
        // Detach the chain, update or append, then relink in order.
        let mut nodes = Vec::new();
        let mut replaced = false;
        let mut cursor = self.head.take();
        while let Some(mut node) = cursor {
            cursor = node.next.take();
            if node.arg_types == arg_types {
                node.func = func;
                node.data = data;
                replaced = true;
            }
            nodes.push(node);
        }
        if !replaced {
            nodes.push(Box::new(Loop1d {
                func,
                data,
                arg_types,
                next: None,
            }));
        }
        self.head = nodes.into_iter().rev().fold(None, |next, mut node| {
            node.next = next;
            Some(node)
        });
    }
}

impl Drop for LoopCapsule {
    fn drop(&mut self) {
        // Unlink iteratively so long chains don't recurse.
        let mut cursor = self.head.take();
        while let Some(mut node) = cursor {
            cursor = node.next.take();
        }
    }
}

/// Registry of user loops keyed by user type number
#[derive(Default)]
pub struct UserLoops {
    by_type: IndexMap<TypeNum, LoopCapsule>,
}

impl UserLoops {
    pub(super) fn register(
        &mut self,
        usertype: TypeNum,
        func: LoopFn,
        arg_types: Vec<TypeNum>,
        data: LoopData,
    ) {
        self.by_type
            .entry(usertype)
            .or_default()
            .insert(func, arg_types, data);
    }

    /// Capsules in registration order
    pub fn iter(&self) -> impl Iterator<Item = (TypeNum, &LoopCapsule)> {
        self.by_type.iter().map(|(&usertype, capsule)| (usertype, capsule))
    }

    /// Capsule for one user type
    pub fn get(&self, usertype: TypeNum) -> Option<&LoopCapsule> {
        self.by_type.get(&usertype)
    }

    /// Total number of loops across every chain
    pub fn loop_count(&self) -> usize {
        self.by_type.values().map(|capsule| capsule.iter().count()).sum()
    }
}
