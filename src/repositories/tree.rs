//! # Tree Repository
//!
//! Adjacency-list trees (category/org/permission) with move and copy
//! operations: move a node to first-child/last-child/left/right of a target
//! (cycle-safe), copy a subtree into a possibly different tenant.

use std::collections::HashMap;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, Set,
};
use serde_json::{Value as JsonValue, json};

use crate::error::RepositoryError;
use crate::idgen::IdGenerator;
use crate::models::tree_node::{
    ActiveModel as NodeActiveModel, Entity as TreeNode, Model as NodeModel,
};
use crate::models::tree_node;

/// Where to place a moved node relative to the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovePosition {
    FirstChild,
    LastChild,
    Left,
    Right,
}

impl MovePosition {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "first-child" => Some(MovePosition::FirstChild),
            "last-child" => Some(MovePosition::LastChild),
            "left" => Some(MovePosition::Left),
            "right" => Some(MovePosition::Right),
            _ => None,
        }
    }
}

/// Request data for creating a tree node.
#[derive(Debug, Clone)]
pub struct CreateNodeRequest {
    pub sys_id: i32,
    pub org_id: i32,
    pub kind: String,
    pub parent_id: Option<String>,
    pub name: String,
    pub sort_num: i32,
    pub data: Option<String>,
}

/// Repository for tree operations.
pub struct TreeRepository<'a> {
    db: &'a DatabaseConnection,
    idgen: &'a IdGenerator,
}

impl<'a> TreeRepository<'a> {
    pub fn new(db: &'a DatabaseConnection, idgen: &'a IdGenerator) -> Self {
        Self { db, idgen }
    }

    pub async fn create_node(
        &self,
        request: CreateNodeRequest,
    ) -> Result<NodeModel, RepositoryError> {
        if request.name.trim().is_empty() {
            return Err(RepositoryError::validation_error("name cannot be empty"));
        }
        if let Some(parent_id) = &request.parent_id {
            let parent = self.get_node_required(parent_id).await?;
            if parent.kind != request.kind {
                return Err(RepositoryError::validation_error(
                    "parent node belongs to a different tree kind",
                ));
            }
        }

        let node = NodeActiveModel {
            id: Set(self.idgen.next_id("T")),
            sys_id: Set(request.sys_id),
            org_id: Set(request.org_id),
            kind: Set(request.kind),
            parent_id: Set(request.parent_id),
            name: Set(request.name),
            sort_num: Set(request.sort_num),
            data: Set(request.data),
            create_time: Set(chrono::Utc::now().into()),
        };

        Ok(node.insert(self.db).await?)
    }

    pub async fn get_node(&self, id: &str) -> Result<Option<NodeModel>, RepositoryError> {
        Ok(TreeNode::find_by_id(id).one(self.db).await?)
    }

    async fn get_node_required(&self, id: &str) -> Result<NodeModel, RepositoryError> {
        self.get_node(id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("Tree node not found: {id}")))
    }

    /// All nodes of one tree, ordered for sibling layout.
    pub async fn list_nodes(
        &self,
        kind: &str,
        sys_id: i32,
    ) -> Result<Vec<NodeModel>, RepositoryError> {
        Ok(TreeNode::find()
            .filter(tree_node::Column::Kind.eq(kind))
            .filter(tree_node::Column::SysId.eq(sys_id))
            .order_by_asc(tree_node::Column::SortNum)
            .order_by_asc(tree_node::Column::Id)
            .all(self.db)
            .await?)
    }

    /// The full tree as nested JSON (`children` arrays, sibling-ordered).
    pub async fn tree(&self, kind: &str, sys_id: i32) -> Result<JsonValue, RepositoryError> {
        let nodes = self.list_nodes(kind, sys_id).await?;

        let mut children_of: HashMap<Option<String>, Vec<&NodeModel>> = HashMap::new();
        for node in &nodes {
            children_of
                .entry(node.parent_id.clone())
                .or_default()
                .push(node);
        }

        fn render(
            node: &NodeModel,
            children_of: &HashMap<Option<String>, Vec<&NodeModel>>,
        ) -> JsonValue {
            let children: Vec<JsonValue> = children_of
                .get(&Some(node.id.clone()))
                .map(|nodes| nodes.iter().map(|n| render(n, children_of)).collect())
                .unwrap_or_default();
            json!({
                "id": node.id,
                "name": node.name,
                "kind": node.kind,
                "sort_num": node.sort_num,
                "data": node.data,
                "children": children,
            })
        }

        let roots: Vec<JsonValue> = children_of
            .get(&None)
            .map(|nodes| nodes.iter().map(|n| render(n, &children_of)).collect())
            .unwrap_or_default();
        Ok(JsonValue::Array(roots))
    }

    /// Ids of a node and all its descendants.
    async fn subtree_ids(&self, root: &NodeModel) -> Result<Vec<String>, RepositoryError> {
        let nodes = self.list_nodes(&root.kind, root.sys_id).await?;
        let mut children_of: HashMap<&str, Vec<&NodeModel>> = HashMap::new();
        for node in &nodes {
            if let Some(parent_id) = &node.parent_id {
                children_of.entry(parent_id.as_str()).or_default().push(node);
            }
        }

        let mut ids = Vec::new();
        let mut stack = vec![root.id.clone()];
        while let Some(id) = stack.pop() {
            if let Some(children) = children_of.get(id.as_str()) {
                stack.extend(children.iter().map(|c| c.id.clone()));
            }
            ids.push(id);
        }
        Ok(ids)
    }

    /// Delete a node and its whole subtree.
    pub async fn delete_subtree(&self, id: &str) -> Result<u64, RepositoryError> {
        let node = self.get_node_required(id).await?;
        let ids = self.subtree_ids(&node).await?;
        let result = TreeNode::delete_many()
            .filter(tree_node::Column::Id.is_in(ids))
            .exec(self.db)
            .await?;
        Ok(result.rows_affected)
    }

    /// Move a node relative to a target of the same tree. Moving a node into
    /// its own subtree is rejected.
    pub async fn move_node(
        &self,
        id: &str,
        target_id: &str,
        position: MovePosition,
    ) -> Result<NodeModel, RepositoryError> {
        if id == target_id {
            return Err(RepositoryError::validation_error(
                "cannot move a node relative to itself",
            ));
        }

        let node = self.get_node_required(id).await?;
        let target = self.get_node_required(target_id).await?;
        if node.kind != target.kind || node.sys_id != target.sys_id {
            return Err(RepositoryError::validation_error(
                "node and target belong to different trees",
            ));
        }

        let subtree = self.subtree_ids(&node).await?;
        if subtree.iter().any(|sid| sid == target_id) {
            return Err(RepositoryError::validation_error(
                "cannot move a node into its own subtree",
            ));
        }

        let new_parent = match position {
            MovePosition::FirstChild | MovePosition::LastChild => Some(target.id.clone()),
            MovePosition::Left | MovePosition::Right => target.parent_id.clone(),
        };

        // Lay out the destination sibling list with the node inserted.
        let mut siblings: Vec<NodeModel> = self
            .list_nodes(&node.kind, node.sys_id)
            .await?
            .into_iter()
            .filter(|n| n.parent_id == new_parent && n.id != node.id)
            .collect();

        let index = match position {
            MovePosition::FirstChild => 0,
            MovePosition::LastChild => siblings.len(),
            MovePosition::Left | MovePosition::Right => {
                let target_index = siblings
                    .iter()
                    .position(|n| n.id == target.id)
                    .unwrap_or(siblings.len());
                if position == MovePosition::Left {
                    target_index
                } else {
                    target_index + 1
                }
            }
        };

        let mut moved = node.clone();
        moved.parent_id = new_parent.clone();
        siblings.insert(index.min(siblings.len()), moved);

        let mut updated_node = None;
        for (i, sibling) in siblings.into_iter().enumerate() {
            let sort_num = (i + 1) as i32;
            let is_moved = sibling.id == node.id;
            if !is_moved && sibling.sort_num == sort_num {
                continue;
            }
            let mut active = sibling.into_active_model();
            active.sort_num = Set(sort_num);
            if is_moved {
                active.parent_id = Set(new_parent.clone());
            }
            let saved = active.update(self.db).await?;
            if is_moved {
                updated_node = Some(saved);
            }
        }

        updated_node.ok_or_else(|| RepositoryError::NotFound(format!("Tree node not found: {id}")))
    }

    /// Copy a subtree under a new parent, possibly into a different tenant.
    /// Returns the new root node.
    pub async fn copy_subtree(
        &self,
        source_id: &str,
        target_parent_id: Option<&str>,
        target_sys_id: i32,
    ) -> Result<NodeModel, RepositoryError> {
        let source = self.get_node_required(source_id).await?;
        if let Some(parent_id) = target_parent_id {
            let parent = self.get_node_required(parent_id).await?;
            if parent.kind != source.kind {
                return Err(RepositoryError::validation_error(
                    "target parent belongs to a different tree kind",
                ));
            }
        }

        let nodes = self.list_nodes(&source.kind, source.sys_id).await?;
        let mut children_of: HashMap<&str, Vec<&NodeModel>> = HashMap::new();
        for node in &nodes {
            if let Some(parent_id) = &node.parent_id {
                children_of.entry(parent_id.as_str()).or_default().push(node);
            }
        }

        let mut new_root = None;
        // (source node, new parent id)
        let mut stack: Vec<(&NodeModel, Option<String>)> =
            vec![(&source, target_parent_id.map(str::to_string))];
        // Depth-first clone; sibling order is preserved by sort_num copy.
        while let Some((original, new_parent)) = stack.pop() {
            let clone = NodeActiveModel {
                id: Set(self.idgen.next_id("T")),
                sys_id: Set(target_sys_id),
                org_id: Set(original.org_id),
                kind: Set(original.kind.clone()),
                parent_id: Set(new_parent),
                name: Set(original.name.clone()),
                sort_num: Set(original.sort_num),
                data: Set(original.data.clone()),
                create_time: Set(chrono::Utc::now().into()),
            };
            let clone = clone.insert(self.db).await?;

            if let Some(children) = children_of.get(original.id.as_str()) {
                for child in children {
                    stack.push((*child, Some(clone.id.clone())));
                }
            }
            if original.id == source.id {
                new_root = Some(clone);
            }
        }

        new_root.ok_or_else(|| RepositoryError::NotFound(format!("Tree node not found: {source_id}")))
    }
}
