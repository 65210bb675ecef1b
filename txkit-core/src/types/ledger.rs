//! Signature bookkeeping for a single in-progress transaction.
//!
//! A [`SignatureLedger`] owns the signatures applied so far, rejects a signer that would be
//! counted twice and decides whether the collected set satisfies the authorization the
//! transaction is bound to.
use super::{Bytes, SignatureEntry, SignerId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use tracing::{trace, warn};

/// An error raised by the signature ledger
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// The identity has already signed or is already queued
    #[error("signer {0} has already signed this transaction")]
    DuplicateSigner(SignerId),
    /// The identity is not one of the declared keys of the authority
    #[error("signer {0} is not part of the declared authority")]
    UndeclaredSigner(SignerId),
    #[error("invalid signer configuration: {0}")]
    InvalidConfiguration(String),
    #[error("threshold not met: {collected} of {required} required")]
    ThresholdNotMet { required: u32, collected: u32 },
    #[error("too many signatures: {collected} collected, exactly {required} allowed")]
    OverThreshold { required: u32, collected: u32 },
}

/// How signatures are laid out when the authorization structure is emitted
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureOrder {
    /// Indexed positionally by the order the keys were declared
    Declared,
    /// In the order signatures were added
    Insertion,
}

/// Whether a threshold may be exceeded
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThresholdPolicy {
    /// Any collected weight at or above the threshold is accepted
    AtLeast,
    /// The collected weight must equal the threshold
    Exactly,
}

/// A key declared by an authority, with the weight it contributes
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredKey {
    pub signer: SignerId,
    pub weight: u32,
}

impl DeclaredKey {
    pub fn new(signer: SignerId, weight: u32) -> Self {
        Self { signer, weight }
    }
}

/// A fixed, ordered list of declared keys and the weight required to authorize
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authority {
    threshold: u32,
    keys: Vec<DeclaredKey>,
}

impl Authority {
    /// Validates and creates a weighted authority.
    ///
    /// The threshold must be positive and reachable, keys must be distinct and every weight
    /// must be positive.
    pub fn new(threshold: u32, keys: Vec<DeclaredKey>) -> Result<Self, LedgerError> {
        if keys.is_empty() {
            return Err(LedgerError::InvalidConfiguration("no keys declared".into()))
        }
        if threshold == 0 {
            return Err(LedgerError::InvalidConfiguration("threshold must be positive".into()))
        }
        let mut seen = HashSet::with_capacity(keys.len());
        for key in &keys {
            if key.weight == 0 {
                return Err(LedgerError::InvalidConfiguration(format!(
                    "key {} declared with zero weight",
                    key.signer
                )))
            }
            if !seen.insert(&key.signer) {
                return Err(LedgerError::DuplicateSigner(key.signer.clone()))
            }
        }
        let total: u64 = keys.iter().map(|k| k.weight as u64).sum();
        if threshold as u64 > total {
            return Err(LedgerError::InvalidConfiguration(format!(
                "threshold {threshold} exceeds total declared weight {total}"
            )))
        }
        Ok(Self { threshold, keys })
    }

    /// An authority where every key weighs 1, i.e. a plain T-of-N multisig
    pub fn unweighted(threshold: u32, signers: Vec<SignerId>) -> Result<Self, LedgerError> {
        Self::new(threshold, signers.into_iter().map(|s| DeclaredKey::new(s, 1)).collect())
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn keys(&self) -> &[DeclaredKey] {
        &self.keys
    }

    /// Position of `signer` in declaration order
    pub fn position(&self, signer: &SignerId) -> Option<usize> {
        self.keys.iter().position(|k| &k.signer == signer)
    }

    pub fn weight_of(&self, signer: &SignerId) -> Option<u32> {
        self.keys.iter().find(|k| &k.signer == signer).map(|k| k.weight)
    }
}

/// The signing discipline a chain builder binds its ledger to
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Discipline {
    /// Exactly one signer, threshold 1
    SingleKey,
    /// T-of-N declared keys
    Threshold { authority: Authority, order: SignatureOrder, policy: ThresholdPolicy },
}

impl Default for Discipline {
    fn default() -> Self {
        Discipline::SingleKey
    }
}

/// The ordered, deduplicated signatures of one in-progress transaction.
///
/// Entries are append-only; the owning builder clears the ledger with [`reset`] when it loads
/// a different transaction.
///
/// [`reset`]: SignatureLedger::reset
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SignatureLedger {
    discipline: Discipline,
    entries: Vec<SignatureEntry>,
}

impl SignatureLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_discipline(discipline: Discipline) -> Self {
        Self { discipline, entries: Vec::new() }
    }

    pub fn discipline(&self) -> &Discipline {
        &self.discipline
    }

    /// Binds the ledger to a new discipline, checking the signatures already present
    /// against it.
    pub fn set_discipline(&mut self, discipline: Discipline) -> Result<(), LedgerError> {
        match &discipline {
            Discipline::SingleKey if self.entries.len() > 1 => {
                return Err(LedgerError::InvalidConfiguration(format!(
                    "{} signatures present but only one signer is allowed",
                    self.entries.len()
                )))
            }
            Discipline::Threshold { authority, .. } => {
                if let Some(entry) =
                    self.entries.iter().find(|e| authority.position(&e.signer).is_none())
                {
                    return Err(LedgerError::UndeclaredSigner(entry.signer.clone()))
                }
            }
            _ => {}
        }
        self.discipline = discipline;
        Ok(())
    }

    /// The weight required to authorize
    pub fn threshold(&self) -> u32 {
        match &self.discipline {
            Discipline::SingleKey => 1,
            Discipline::Threshold { authority, .. } => authority.threshold(),
        }
    }

    pub fn entries(&self) -> &[SignatureEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, signer: &SignerId) -> bool {
        self.entries.iter().any(|e| &e.signer == signer)
    }

    /// Checks whether `signer` may be added given the signers already `pending` on the
    /// builder, without modifying the ledger.
    pub fn admit(&self, signer: &SignerId, pending: &[SignerId]) -> Result<(), LedgerError> {
        if self.contains(signer) || pending.contains(signer) {
            warn!(%signer, "rejecting duplicate signer");
            return Err(LedgerError::DuplicateSigner(signer.clone()))
        }
        match &self.discipline {
            Discipline::SingleKey => {
                if !self.entries.is_empty() || !pending.is_empty() {
                    return Err(LedgerError::InvalidConfiguration(format!(
                        "single-key transaction already has a signer, cannot add {signer}"
                    )))
                }
            }
            Discipline::Threshold { authority, .. } => {
                if authority.position(signer).is_none() {
                    return Err(LedgerError::UndeclaredSigner(signer.clone()))
                }
            }
        }
        Ok(())
    }

    /// Appends a signature, returning the recorded entry
    pub fn append(
        &mut self,
        signer: SignerId,
        signature: impl Into<Bytes>,
    ) -> Result<&SignatureEntry, LedgerError> {
        self.admit(&signer, &[])?;
        Ok(self.push(signer, signature.into()))
    }

    /// Replaces the ledger content with signatures decoded from a serialized transaction.
    ///
    /// Only duplicates are rejected here: the declared authority is generally not part of
    /// the serialized form, so membership is checked once the caller binds a discipline.
    pub fn restore(
        &mut self,
        entries: impl IntoIterator<Item = (SignerId, Bytes)>,
    ) -> Result<(), LedgerError> {
        self.reset();
        for (signer, signature) in entries {
            if self.contains(&signer) {
                warn!(%signer, "duplicate signer in serialized transaction");
                self.reset();
                return Err(LedgerError::DuplicateSigner(signer))
            }
            self.push(signer, signature);
        }
        Ok(())
    }

    fn push(&mut self, signer: SignerId, signature: Bytes) -> &SignatureEntry {
        let order = self.entries.len();
        trace!(%signer, order, "recording signature");
        self.entries.push(SignatureEntry::new(signer, signature, order));
        &self.entries[order]
    }

    /// Drops every signature
    pub fn reset(&mut self) {
        self.entries.clear();
    }

    /// Weight contributed by the signatures collected so far
    pub fn collected_weight(&self) -> u32 {
        match &self.discipline {
            Discipline::SingleKey => self.entries.len() as u32,
            Discipline::Threshold { authority, .. } => self
                .entries
                .iter()
                .filter_map(|e| authority.weight_of(&e.signer))
                .fold(0u32, u32::saturating_add),
        }
    }

    /// Fails unless the collected signatures satisfy the discipline
    pub fn check_threshold(&self) -> Result<(), LedgerError> {
        let required = self.threshold();
        let collected = self.collected_weight();
        match &self.discipline {
            Discipline::SingleKey => {
                if collected > 1 {
                    return Err(LedgerError::OverThreshold { required, collected })
                }
            }
            Discipline::Threshold { authority, policy, .. } => {
                if let Some(entry) =
                    self.entries.iter().find(|e| authority.position(&e.signer).is_none())
                {
                    return Err(LedgerError::UndeclaredSigner(entry.signer.clone()))
                }
                if *policy == ThresholdPolicy::Exactly && collected > required {
                    return Err(LedgerError::OverThreshold { required, collected })
                }
            }
        }
        if collected < required {
            return Err(LedgerError::ThresholdNotMet { required, collected })
        }
        Ok(())
    }

    pub fn is_satisfied(&self) -> bool {
        self.check_threshold().is_ok()
    }

    /// Entries in the order the chain expects them to be emitted
    pub fn ordered(&self) -> Vec<&SignatureEntry> {
        let mut entries: Vec<&SignatureEntry> = self.entries.iter().collect();
        if let Discipline::Threshold { authority, order: SignatureOrder::Declared, .. } =
            &self.discipline
        {
            entries.sort_by_key(|e| authority.position(&e.signer).unwrap_or(usize::MAX));
        }
        entries
    }

    /// One slot per declared key, in declaration order. Empty for single-key ledgers.
    pub fn positional(&self) -> Vec<(&DeclaredKey, Option<&SignatureEntry>)> {
        match &self.discipline {
            Discipline::SingleKey => Vec::new(),
            Discipline::Threshold { authority, .. } => authority
                .keys()
                .iter()
                .map(|key| (key, self.entries.iter().find(|e| e.signer == key.signer)))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Algorithm, KeyMaterial};

    fn identities(n: usize) -> Vec<SignerId> {
        (0..n)
            .map(|_| KeyMaterial::random(Algorithm::Ed25519, &mut rand::thread_rng()).identity())
            .collect()
    }

    fn multisig(
        threshold: u32,
        signers: &[SignerId],
        order: SignatureOrder,
        policy: ThresholdPolicy,
    ) -> SignatureLedger {
        let authority = Authority::unweighted(threshold, signers.to_vec()).unwrap();
        SignatureLedger::with_discipline(Discipline::Threshold { authority, order, policy })
    }

    #[test]
    fn single_key_accepts_one_signer() {
        let ids = identities(2);
        let mut ledger = SignatureLedger::new();
        assert_eq!(ledger.threshold(), 1);
        assert_eq!(
            ledger.check_threshold().unwrap_err(),
            LedgerError::ThresholdNotMet { required: 1, collected: 0 }
        );

        ledger.append(ids[0].clone(), vec![1u8; 64]).unwrap();
        ledger.check_threshold().unwrap();
        assert!(matches!(
            ledger.admit(&ids[1], &[]),
            Err(LedgerError::InvalidConfiguration(_))
        ));
        assert_eq!(
            ledger.append(ids[0].clone(), vec![2u8; 64]).unwrap_err(),
            LedgerError::DuplicateSigner(ids[0].clone())
        );
    }

    #[test]
    fn pending_signers_count_as_duplicates() {
        let ids = identities(3);
        let ledger = multisig(2, &ids, SignatureOrder::Declared, ThresholdPolicy::AtLeast);
        assert_eq!(
            ledger.admit(&ids[1], &[ids[1].clone()]).unwrap_err(),
            LedgerError::DuplicateSigner(ids[1].clone())
        );
        ledger.admit(&ids[2], &[ids[1].clone()]).unwrap();
    }

    #[test]
    fn threshold_and_membership() {
        let ids = identities(3);
        let outsider = identities(1).remove(0);
        let mut ledger = multisig(2, &ids, SignatureOrder::Declared, ThresholdPolicy::AtLeast);

        assert_eq!(
            ledger.append(outsider.clone(), vec![0u8; 64]).unwrap_err(),
            LedgerError::UndeclaredSigner(outsider)
        );

        ledger.append(ids[2].clone(), vec![2u8; 64]).unwrap();
        assert_eq!(
            ledger.check_threshold().unwrap_err(),
            LedgerError::ThresholdNotMet { required: 2, collected: 1 }
        );
        ledger.append(ids[0].clone(), vec![0u8; 64]).unwrap();
        ledger.check_threshold().unwrap();
        ledger.append(ids[1].clone(), vec![1u8; 64]).unwrap();
        ledger.check_threshold().unwrap();
    }

    #[test]
    fn exactly_policy_rejects_extra_signatures() {
        let ids = identities(3);
        let mut ledger = multisig(2, &ids, SignatureOrder::Declared, ThresholdPolicy::Exactly);
        for id in &ids {
            ledger.append(id.clone(), vec![9u8; 65]).unwrap();
        }
        assert_eq!(
            ledger.check_threshold().unwrap_err(),
            LedgerError::OverThreshold { required: 2, collected: 3 }
        );
    }

    #[test]
    fn declared_order_is_independent_of_signing_order() {
        let ids = identities(3);
        let mut ledger = multisig(3, &ids, SignatureOrder::Declared, ThresholdPolicy::AtLeast);
        for i in [2usize, 0, 1] {
            ledger.append(ids[i].clone(), vec![i as u8; 64]).unwrap();
        }
        let ordered: Vec<_> = ledger.ordered().iter().map(|e| e.signer.clone()).collect();
        assert_eq!(ordered, ids);
        // insertion positions are preserved on the entries themselves
        assert_eq!(ledger.entries()[0].signer, ids[2]);
        assert_eq!(ledger.entries()[0].order, 0);

        let mut insertion = multisig(3, &ids, SignatureOrder::Insertion, ThresholdPolicy::AtLeast);
        for i in [2usize, 0, 1] {
            insertion.append(ids[i].clone(), vec![i as u8; 64]).unwrap();
        }
        let ordered: Vec<_> = insertion.ordered().iter().map(|e| e.signer.clone()).collect();
        assert_eq!(ordered, vec![ids[2].clone(), ids[0].clone(), ids[1].clone()]);
    }

    #[test]
    fn positional_slots() {
        let ids = identities(3);
        let mut ledger = multisig(2, &ids, SignatureOrder::Declared, ThresholdPolicy::AtLeast);
        ledger.append(ids[1].clone(), vec![1u8; 64]).unwrap();
        let slots = ledger.positional();
        assert_eq!(slots.len(), 3);
        assert!(slots[0].1.is_none());
        assert_eq!(slots[1].1.map(|e| e.signer.clone()), Some(ids[1].clone()));
        assert!(slots[2].1.is_none());
    }

    #[test]
    fn weighted_threshold() {
        let ids = identities(3);
        let authority = Authority::new(
            3,
            vec![
                DeclaredKey::new(ids[0].clone(), 2),
                DeclaredKey::new(ids[1].clone(), 1),
                DeclaredKey::new(ids[2].clone(), 1),
            ],
        )
        .unwrap();
        let mut ledger = SignatureLedger::with_discipline(Discipline::Threshold {
            authority,
            order: SignatureOrder::Insertion,
            policy: ThresholdPolicy::AtLeast,
        });
        ledger.append(ids[0].clone(), vec![0u8; 65]).unwrap();
        assert_eq!(ledger.collected_weight(), 2);
        assert!(!ledger.is_satisfied());
        ledger.append(ids[2].clone(), vec![2u8; 65]).unwrap();
        assert!(ledger.is_satisfied());
    }

    #[test]
    fn invalid_authorities() {
        let ids = identities(2);
        assert!(Authority::unweighted(3, ids.clone()).is_err());
        assert!(Authority::unweighted(0, ids.clone()).is_err());
        assert!(Authority::unweighted(1, vec![]).is_err());
        assert_eq!(
            Authority::unweighted(1, vec![ids[0].clone(), ids[0].clone()]).unwrap_err(),
            LedgerError::DuplicateSigner(ids[0].clone())
        );
        assert!(Authority::new(1, vec![DeclaredKey::new(ids[0].clone(), 0)]).is_err());
    }

    #[test]
    fn restore_then_bind_discipline() {
        let ids = identities(3);
        let mut ledger = SignatureLedger::new();
        ledger
            .restore(vec![
                (ids[0].clone(), vec![0u8; 64].into()),
                (ids[1].clone(), vec![1u8; 64].into()),
            ])
            .unwrap();
        assert_eq!(ledger.len(), 2);

        let authority = Authority::unweighted(2, ids[1..].to_vec()).unwrap();
        let err = ledger
            .set_discipline(Discipline::Threshold {
                authority,
                order: SignatureOrder::Declared,
                policy: ThresholdPolicy::AtLeast,
            })
            .unwrap_err();
        assert_eq!(err, LedgerError::UndeclaredSigner(ids[0].clone()));

        let authority = Authority::unweighted(2, ids.clone()).unwrap();
        ledger
            .set_discipline(Discipline::Threshold {
                authority,
                order: SignatureOrder::Declared,
                policy: ThresholdPolicy::AtLeast,
            })
            .unwrap();
        ledger.check_threshold().unwrap();

        let dup = vec![(ids[0].clone(), Bytes::new()), (ids[0].clone(), Bytes::new())];
        assert!(ledger.restore(dup).is_err());
        assert!(ledger.is_empty());
    }
}
