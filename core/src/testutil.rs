//! In-memory service fakes for core tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use lockstone_providers::{ContentStore, Governance, RegistryRead, RegistryWrite};
use lockstone_types::{
    Address, ContentId, ContentPointer, DeployError, Fuses, Name, NodeId, ProposalId,
    ProposalOperation, ProposalStatus, RegistryNode, TxId, VersionSlot,
};

pub fn parent() -> Name {
    Name::parse("demo.site").unwrap()
}

pub fn governance_account() -> Address {
    Address::parse("0x00000000000000000000000000000000000000a1").unwrap()
}

pub fn other_account() -> Address {
    Address::parse("0x00000000000000000000000000000000000000b2").unwrap()
}

pub fn sample_content_id() -> ContentId {
    let mut multihash = vec![0x12, 0x20];
    multihash.extend_from_slice(&[0x42; 32]);
    ContentId::Current {
        codec: 0x70,
        multihash,
    }
}

#[derive(Debug, Clone)]
struct FakeNode {
    owner: Address,
    fuses: Fuses,
    expiry: u64,
    pointer: Option<ContentPointer>,
}

/// An in-memory registry with injectable read failures and one-shot race
/// simulation.
#[derive(Default)]
pub struct FakeRegistry {
    nodes: Mutex<HashMap<NodeId, FakeNode>>,
    failing_reads: Mutex<Vec<NodeId>>,
    /// Labels a concurrent deployment "wins" at the moment we try to create
    /// them: the create fails with a conflict and the node appears, owned by
    /// someone else.
    race_labels: Mutex<Vec<(NodeId, String)>>,
    pub creates: AtomicU32,
    pub reads: AtomicU32,
}

impl FakeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_owner(&self, node: NodeId, owner: Address) {
        self.nodes.lock().unwrap().insert(
            node,
            FakeNode {
                owner,
                fuses: Fuses::empty(),
                expiry: 0,
                pointer: None,
            },
        );
    }

    pub fn occupy(&self, parent: &Name, label: &str, owner: Address) {
        self.set_owner(parent.node().child(label), owner);
    }

    pub fn fail_reads_for(&self, parent: &Name, label: &str) {
        self.fail_reads_for_node(parent.node().child(label));
    }

    pub fn fail_reads_for_node(&self, node: NodeId) {
        self.failing_reads.lock().unwrap().push(node);
    }

    /// The next create of `label` under `parent` loses a race.
    pub fn race_once_on(&self, parent: &Name, label: &str) {
        self.race_labels
            .lock()
            .unwrap()
            .push((parent.node(), label.to_string()));
    }

    pub fn has_node(&self, parent: &Name, label: &str) -> bool {
        self.nodes
            .lock()
            .unwrap()
            .contains_key(&parent.node().child(label))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.lock().unwrap().len()
    }
}

impl RegistryRead for FakeRegistry {
    async fn get_owner(&self, node: NodeId) -> Result<Option<Address>, DeployError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.failing_reads.lock().unwrap().contains(&node) {
            return Err(DeployError::RegistryRead {
                operation: "getOwner",
                source: "injected transport failure".into(),
            });
        }
        Ok(self.nodes.lock().unwrap().get(&node).map(|n| n.owner))
    }

    async fn get_data(&self, node: NodeId) -> Result<Option<RegistryNode>, DeployError> {
        Ok(self.nodes.lock().unwrap().get(&node).map(|n| RegistryNode {
            owner: Some(n.owner),
            fuses: n.fuses,
            expiry: n.expiry,
        }))
    }

    async fn get_content_pointer(
        &self,
        node: NodeId,
    ) -> Result<Option<ContentPointer>, DeployError> {
        Ok(self
            .nodes
            .lock()
            .unwrap()
            .get(&node)
            .and_then(|n| n.pointer.clone()))
    }
}

impl RegistryWrite for FakeRegistry {
    async fn create_child(
        &self,
        parent: NodeId,
        label: &str,
        owner: Address,
        fuses: Fuses,
        expiry: u64,
    ) -> Result<TxId, DeployError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        let child = parent.child(label);

        let raced = {
            let mut races = self.race_labels.lock().unwrap();
            let hit = races
                .iter()
                .position(|(node, raced_label)| *node == parent && raced_label == label);
            match hit {
                Some(index) => {
                    races.remove(index);
                    true
                }
                None => false,
            }
        };
        if raced {
            self.nodes.lock().unwrap().insert(
                child,
                FakeNode {
                    owner: other_account(),
                    fuses: Fuses::PERMANENT_PUBLICATION,
                    expiry,
                    pointer: None,
                },
            );
            let slot = label.parse::<VersionSlot>().expect("raced label is a slot");
            return Err(DeployError::VersionSlotConflict { slot });
        }

        let mut nodes = self.nodes.lock().unwrap();
        if nodes.contains_key(&child) {
            let slot = label.parse::<VersionSlot>().map_err(|_| {
                DeployError::RegistryWrite {
                    operation: "createChild",
                    source: format!("label {label:?} already exists").into(),
                }
            })?;
            return Err(DeployError::VersionSlotConflict { slot });
        }
        nodes.insert(
            child,
            FakeNode {
                owner,
                fuses,
                expiry,
                pointer: None,
            },
        );
        Ok(TxId::new(format!("0xtx-{label}")))
    }

    async fn set_content_pointer(
        &self,
        node: NodeId,
        pointer: &ContentPointer,
    ) -> Result<TxId, DeployError> {
        let mut nodes = self.nodes.lock().unwrap();
        let entry = nodes.get_mut(&node).ok_or(DeployError::RegistryWrite {
            operation: "setContentPointer",
            source: "no such node".into(),
        })?;
        entry.pointer = Some(pointer.clone());
        Ok(TxId::new("0xtx-pointer"))
    }

    async fn set_fuses(&self, node: NodeId, fuses: Fuses) -> Result<TxId, DeployError> {
        let mut nodes = self.nodes.lock().unwrap();
        let entry = nodes.get_mut(&node).ok_or(DeployError::RegistryWrite {
            operation: "setFuses",
            source: "no such node".into(),
        })?;
        // The registry only ever ORs bits in; so does the fake.
        entry.fuses |= fuses;
        Ok(TxId::new("0xtx-fuses"))
    }
}

/// How the fake governance backend answers proposals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GovernanceBehavior {
    Accept,
    RejectCredential,
    Unavailable,
}

pub struct FakeGovernance {
    pub behavior: GovernanceBehavior,
    pub required: u32,
    proposals: Mutex<Vec<(ProposalId, Vec<ProposalOperation>)>>,
    counter: AtomicU32,
}

impl FakeGovernance {
    pub fn accepting(required: u32) -> Self {
        Self {
            behavior: GovernanceBehavior::Accept,
            required,
            proposals: Mutex::new(Vec::new()),
            counter: AtomicU32::new(0),
        }
    }

    pub fn with_behavior(behavior: GovernanceBehavior) -> Self {
        Self {
            behavior,
            ..Self::accepting(3)
        }
    }

    pub fn proposals(&self) -> Vec<(ProposalId, Vec<ProposalOperation>)> {
        self.proposals.lock().unwrap().clone()
    }
}

impl Governance for FakeGovernance {
    async fn propose(
        &self,
        operations: &[ProposalOperation],
    ) -> Result<ProposalStatus, DeployError> {
        match self.behavior {
            GovernanceBehavior::RejectCredential => Err(DeployError::Authorization {
                detail: "signer is not an approver".to_string(),
            }),
            GovernanceBehavior::Unavailable => Err(DeployError::GovernanceUnavailable {
                source: "injected outage".into(),
            }),
            GovernanceBehavior::Accept => {
                let id = ProposalId::new(format!(
                    "prop-{}",
                    self.counter.fetch_add(1, Ordering::SeqCst)
                ));
                self.proposals
                    .lock()
                    .unwrap()
                    .push((id.clone(), operations.to_vec()));
                Ok(ProposalStatus {
                    id,
                    approved: 1, // submission is the signer's first approval
                    required: self.required,
                    executed: false,
                })
            }
        }
    }

    async fn status(&self, id: &ProposalId) -> Result<ProposalStatus, DeployError> {
        let known = self
            .proposals
            .lock()
            .unwrap()
            .iter()
            .any(|(pid, _)| pid == id);
        if known {
            Ok(ProposalStatus {
                id: id.clone(),
                approved: 1,
                required: self.required,
                executed: false,
            })
        } else {
            Err(DeployError::GovernanceRejected {
                status: 404,
                detail: format!("unknown proposal {id}"),
            })
        }
    }

    async fn execute(&self, id: &ProposalId) -> Result<ProposalStatus, DeployError> {
        Ok(ProposalStatus {
            id: id.clone(),
            approved: self.required,
            required: self.required,
            executed: true,
        })
    }
}

/// Content store that returns a fixed identifier without any IO.
pub struct FakeStore {
    pub content_id: ContentId,
    pub uploads: AtomicU32,
}

impl FakeStore {
    pub fn new() -> Self {
        Self {
            content_id: sample_content_id(),
            uploads: AtomicU32::new(0),
        }
    }
}

impl ContentStore for FakeStore {
    async fn upload_dir(&self, _dir: &Path) -> Result<(ContentId, u64), DeployError> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        Ok((self.content_id.clone(), 1204))
    }
}
