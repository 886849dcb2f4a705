use idledger_identity::{Did, KeyPair};
use idledger_types::{Request, SignedRequest, SigningError};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

/// Holder of the identities requests are signed with.
pub trait Wallet: Send + Sync {
    /// The identity requests are currently issued under.
    fn default_id(&self) -> Did;

    /// A request number not yet used by this wallet.
    fn next_req_id(&self) -> u64;

    /// Sign `request` with the key of its `identifier`.
    fn prepare_request(&self, request: Request) -> Result<SignedRequest, SigningError>;
}

/// In-memory wallet of Ed25519 `did:key` identities.
///
/// Request numbers start at the wall clock in microseconds and only go up,
/// so a restarted wallet does not reuse the numbers of an earlier run.
#[derive(Debug)]
pub struct KeyWallet {
    keys: RwLock<BTreeMap<Did, KeyPair>>,
    default_id: RwLock<Did>,
    last_req_id: AtomicU64,
}

impl KeyWallet {
    /// Create a wallet whose default identity is `keypair`.
    pub fn new(keypair: KeyPair) -> Self {
        let did = keypair.did.clone();
        let mut keys = BTreeMap::new();
        keys.insert(did.clone(), keypair);

        let seed = chrono::Utc::now().timestamp_micros().max(0) as u64;
        Self {
            keys: RwLock::new(keys),
            default_id: RwLock::new(did),
            last_req_id: AtomicU64::new(seed),
        }
    }

    /// Add an identity without changing the default.
    pub fn add_identity(&self, keypair: KeyPair) -> Did {
        let did = keypair.did.clone();
        self.keys
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(did.clone(), keypair);
        did
    }

    /// Make `did` the identity subsequent requests are issued under.
    pub fn set_default(&self, did: &Did) -> Result<(), SigningError> {
        if !self.has_identity(did) {
            return Err(SigningError::UnknownIdentity(did.clone()));
        }
        *self
            .default_id
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = did.clone();
        tracing::debug!("Default wallet identity is now {}", did);
        Ok(())
    }

    pub fn has_identity(&self, did: &Did) -> bool {
        self.keys
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains_key(did)
    }

    pub fn identities(&self) -> Vec<Did> {
        self.keys
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .keys()
            .cloned()
            .collect()
    }
}

impl Wallet for KeyWallet {
    fn default_id(&self) -> Did {
        self.default_id
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn next_req_id(&self) -> u64 {
        self.last_req_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn prepare_request(&self, request: Request) -> Result<SignedRequest, SigningError> {
        let keys = self
            .keys
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let keypair = keys
            .get(&request.identifier)
            .ok_or_else(|| SigningError::UnknownIdentity(request.identifier.clone()))?;

        let signature = keypair.sign(&request.signing_bytes()?);
        Ok(SignedRequest {
            request,
            signature: hex::encode(signature.to_bytes()),
        })
    }
}
