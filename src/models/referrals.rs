use serde::{Deserialize, Serialize};

use super::users::UserSummary;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeState {
    Unloaded,
    Loading,
    Loaded,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralNode {
    pub user_id: String,
    pub name: String,
    pub referral_code: String,
    pub phone_number: String,
    pub children: Vec<ReferralNode>,
    pub state: NodeState,
}

impl ReferralNode {
    /// Builds an unexpanded node; the name falls back to the phone number.
    pub fn unloaded(user: &UserSummary) -> Self {
        let name = match user.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name.to_string(),
            _ => user.phone_number.clone(),
        };

        ReferralNode {
            user_id: user.id.clone(),
            name,
            referral_code: user.referral_code.clone(),
            phone_number: user.phone_number.clone(),
            children: Vec::new(),
            state: NodeState::Unloaded,
        }
    }

    /// The node reached by following child indexes from this one.
    pub fn at_path(&self, path: &[usize]) -> Option<&ReferralNode> {
        path.iter()
            .try_fold(self, |node, &index| node.children.get(index))
    }

    pub fn at_path_mut(&mut self, path: &[usize]) -> Option<&mut ReferralNode> {
        path.iter()
            .try_fold(self, |node, &index| node.children.get_mut(index))
    }

    pub fn count(&self) -> usize {
        1 + self.children.iter().map(ReferralNode::count).sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(code: &str, children: Vec<ReferralNode>) -> ReferralNode {
        let mut node = ReferralNode::unloaded(&UserSummary {
            id: format!("id-{code}"),
            name: None,
            phone_number: code.to_string(),
            referral_code: code.to_string(),
        });
        node.children = children;
        node
    }

    #[test]
    fn paths_address_nested_nodes() {
        let mut root = node(
            "A",
            vec![node("B", vec![]), node("C", vec![node("D", vec![])])],
        );

        assert_eq!(root.at_path(&[]).unwrap().referral_code, "A");
        assert_eq!(root.at_path(&[1, 0]).unwrap().referral_code, "D");
        assert!(root.at_path(&[0, 0]).is_none());
        assert!(root.at_path(&[5]).is_none());

        root.at_path_mut(&[1, 0]).unwrap().state = NodeState::Loaded;
        assert_eq!(root.children[1].children[0].state, NodeState::Loaded);
        assert_eq!(root.count(), 4);
    }

    #[test]
    fn name_falls_back_to_the_phone_number() {
        assert_eq!(node("0300", vec![]).name, "0300");
    }
}
