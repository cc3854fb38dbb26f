//! Lazily expanded view of the referral graph rooted at one user.
//!
//! Nodes start `Unloaded`. `expand` moves a node to `Loading`, fetches its
//! direct referrals once, and on success attaches them and marks the node
//! `Loaded`. A node that is `Loading` or `Loaded` is never fetched again; a
//! failed fetch puts the node back to `Unloaded` without attaching anything.
//! State is tracked per referral code, so different nodes can be expanded
//! concurrently while repeated requests for the same node collapse into one.

use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use futures_util::future::join_all;
use tokio::sync::RwLock;

use super::ServiceError;
use crate::models::{
    referrals::{NodeState, ReferralNode},
    users::UserSummary,
};

/// Where direct referrals of a code come from.
#[async_trait]
pub trait ReferralSource: Send + Sync {
    async fn referred_by(&self, code: &str) -> Result<Vec<UserSummary>, ServiceError>;
}

#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    #[error("Referral code {0} is not part of this tree")]
    UnknownNode(String),
    #[error("Could not load referrals for {code}: {source}")]
    Fetch { code: String, source: ServiceError },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Expansion {
    /// Children were fetched and attached.
    Loaded(usize),
    /// Nothing fetched; the node was already expanded.
    AlreadyLoaded,
    /// Nothing fetched; another expansion of this node is in flight.
    InFlight,
}

pub struct ReferralTree<S> {
    source: S,
    root: RwLock<ReferralNode>,
    states: DashMap<String, NodeState>,
    /// Child indexes from the root to each displayed code. Children are only
    /// ever attached once, so a path never changes after it is recorded.
    paths: DashMap<String, Vec<usize>>,
}

impl<S: ReferralSource> ReferralTree<S> {
    /// Creates the tree with only the root user, not yet expanded.
    pub fn new(source: S, root: &UserSummary) -> Self {
        let root = ReferralNode::unloaded(root);
        let states = DashMap::new();
        states.insert(root.referral_code.clone(), NodeState::Unloaded);
        let paths = DashMap::new();
        paths.insert(root.referral_code.clone(), Vec::new());

        ReferralTree {
            source,
            root: RwLock::new(root),
            states,
            paths,
        }
    }

    pub fn state(&self, code: &str) -> Option<NodeState> {
        self.states.get(code).map(|state| *state)
    }

    /// A copy of the displayed tree with each node's current state.
    pub async fn snapshot(&self) -> ReferralNode {
        let mut root = self.root.read().await.clone();
        self.apply_states(&mut root);
        root
    }

    fn apply_states(&self, node: &mut ReferralNode) {
        if let Some(state) = self.state(&node.referral_code) {
            node.state = state;
        }
        for child in node.children.iter_mut() {
            self.apply_states(child);
        }
    }

    pub async fn expand(&self, code: &str) -> Result<Expansion, TreeError> {
        match self.states.entry(code.to_string()) {
            Entry::Vacant(_) => return Err(TreeError::UnknownNode(code.to_string())),
            Entry::Occupied(mut entry) => {
                let state = *entry.get();
                match state {
                    NodeState::Loaded => return Ok(Expansion::AlreadyLoaded),
                    NodeState::Loading => return Ok(Expansion::InFlight),
                    NodeState::Unloaded => {
                        entry.insert(NodeState::Loading);
                    }
                }
            }
        }

        log::debug!("Loading referrals for {}.", code);
        let referred = match self.source.referred_by(code).await {
            Ok(referred) => referred,
            Err(source) => {
                log::warn!("Failed to load referrals for {}: {}", code, source);
                self.states.insert(code.to_string(), NodeState::Unloaded);
                return Err(TreeError::Fetch {
                    code: code.to_string(),
                    source,
                });
            }
        };

        let attached = self.attach(code, referred).await;
        self.states.insert(code.to_string(), NodeState::Loaded);

        Ok(Expansion::Loaded(attached))
    }

    async fn attach(&self, code: &str, referred: Vec<UserSummary>) -> usize {
        let mut root = self.root.write().await;

        let mut children = Vec::with_capacity(referred.len());
        for user in referred.iter() {
            if self.states.contains_key(&user.referral_code)
                || children
                    .iter()
                    .any(|c: &ReferralNode| c.referral_code == user.referral_code)
            {
                log::warn!(
                    "Referral code {} already shown in the tree, skipping it under {}.",
                    user.referral_code,
                    code
                );
                continue;
            }
            children.push(ReferralNode::unloaded(user));
        }

        let Some(parent_path) = self.paths.get(code).map(|path| path.clone()) else {
            return 0;
        };
        let Some(parent) = root.at_path_mut(&parent_path) else {
            return 0;
        };
        for (index, child) in children.iter().enumerate() {
            let mut path = parent_path.clone();
            path.push(index);
            self.paths.insert(child.referral_code.clone(), path);
            self.states
                .insert(child.referral_code.clone(), NodeState::Unloaded);
        }
        let attached = children.len();
        parent.children = children;
        parent.state = NodeState::Loaded;

        attached
    }

    async fn children_codes(&self, code: &str) -> Vec<String> {
        let Some(path) = self.paths.get(code).map(|path| path.clone()) else {
            return Vec::new();
        };
        let root = self.root.read().await;
        root.at_path(&path)
            .map(|node| {
                node.children
                    .iter()
                    .map(|child| child.referral_code.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Expands the tree breadth-wise, `depth` levels below the root. Every node
    /// of a level is fetched concurrently.
    pub async fn expand_levels(&self, depth: usize) -> Result<(), TreeError> {
        let mut frontier = vec![self.root.read().await.referral_code.clone()];

        for _ in 0..depth {
            if frontier.is_empty() {
                break;
            }

            let results = join_all(frontier.iter().map(|code| self.expand(code))).await;
            for result in results {
                result?;
            }

            let mut next = Vec::new();
            for code in frontier.iter() {
                next.extend(self.children_codes(code).await);
            }
            frontier = next;
        }

        Ok(())
    }
}
