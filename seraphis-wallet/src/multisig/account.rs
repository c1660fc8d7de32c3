//! Multisig accounts: signer-set filters, Lagrange weights, and the
//! verifiable key-exchange that deals the shared spend key.

use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::Identity;
use rand_core::{CryptoRng, RngCore};
use tracing::info;
use zeroize::{Zeroize, ZeroizeOnDrop};

use seraphis_crypto_core::generators::{GEN_U, GEN_X};
use seraphis_crypto_core::keys::hierarchy::{random_scalar, ViewBalanceKeys};

use crate::error::{WalletError, WalletResult};

/// Bitmask over signer indices selecting a signing subset.
pub type SignerSetFilter = u32;

/// Signer-group size cap imposed by the `u32` filter encoding.
pub const MAX_SIGNERS: u32 = 32;

/// Filter with the given signer indices set.
#[must_use]
pub fn filter_from_signers(signers: &[u32]) -> SignerSetFilter {
    signers.iter().fold(0, |mask, index| mask | (1 << index))
}

/// Signer indices present in a filter, ascending.
#[must_use]
pub fn signers_in_filter(filter: SignerSetFilter) -> Vec<u32> {
    (0..MAX_SIGNERS).filter(|i| filter & (1 << i) != 0).collect()
}

/// Every size-`threshold` subset of `num_signers` signers, as filters.
#[must_use]
pub fn signer_subsets(threshold: u32, num_signers: u32) -> Vec<SignerSetFilter> {
    let all: u32 = if num_signers == 32 {
        u32::MAX
    } else {
        (1 << num_signers) - 1
    };
    (1..=all)
        .filter(|mask| mask.count_ones() == threshold && mask & !all == 0)
        .collect()
}

/// Lagrange coefficient at zero for `signer_index` within the subset,
/// over evaluation points `index + 1`.
#[must_use]
pub fn lagrange_weight(filter: SignerSetFilter, signer_index: u32) -> Scalar {
    let own = Scalar::from(u64::from(signer_index) + 1);
    let mut weight = Scalar::ONE;
    for other in signers_in_filter(filter) {
        if other == signer_index {
            continue;
        }
        let point = Scalar::from(u64::from(other) + 1);
        weight *= point * (point - own).invert();
    }
    weight
}

/// Broadcast message of key-exchange round 1: Feldman coefficient
/// commitments over `U` plus this signer's view-balance contribution.
///
/// The `k_vb` contribution is a secret of the signer group; in a real
/// deployment this message travels over the group's secure channel.
#[derive(Clone, Debug)]
pub struct KexRound1Message {
    /// Sending signer.
    pub signer_index: u32,
    /// `a_k·U` for each polynomial coefficient, constant term first.
    pub coefficient_commitments: Vec<EdwardsPoint>,
    /// Additive contribution to the shared `k_vb`.
    pub k_vb_contribution: Scalar,
}

/// One signer's in-progress key exchange.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct KexSession {
    threshold: u32,
    num_signers: u32,
    signer_index: u32,
    // f(t) = coefficients[0] + coefficients[1]·t + …, degree threshold−1.
    coefficients: Vec<Scalar>,
    k_vb_contribution: Scalar,
    nonce_seed: Scalar,
}

/// A ready multisig account: the signer's spend-key share plus the shared
/// view-balance hierarchy.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MultisigAccount {
    /// Signing threshold `t`.
    pub threshold: u32,
    /// Group size `n`.
    pub num_signers: u32,
    /// This signer's index in the group.
    pub signer_index: u32,
    pub(crate) z_share: Scalar,
    /// Public key shares `z_j·U` for every signer, by index.
    #[zeroize(skip)]
    pub share_pubkeys: Vec<EdwardsPoint>,
    /// The shared view-balance hierarchy (common to the whole group).
    pub view_balance: ViewBalanceKeys,
    pub(crate) nonce_seed: Scalar,
}

fn check_group_shape(threshold: u32, num_signers: u32, signer_index: u32) -> WalletResult<()> {
    if threshold == 0 || threshold > num_signers {
        return Err(WalletError::Multisig(format!(
            "threshold {threshold} invalid for {num_signers} signers"
        )));
    }
    if num_signers > MAX_SIGNERS {
        return Err(WalletError::Multisig(format!(
            "{num_signers} signers exceeds the maximum of {MAX_SIGNERS}"
        )));
    }
    if signer_index >= num_signers {
        return Err(WalletError::Multisig(format!(
            "signer index {signer_index} out of range"
        )));
    }
    Ok(())
}

/// Evaluate the committed polynomial of one dealer at `point`, in the
/// exponent: `Σ point^k · F_k`.
fn eval_commitments(commitments: &[EdwardsPoint], point: &Scalar) -> EdwardsPoint {
    let mut power = Scalar::ONE;
    let mut acc = EdwardsPoint::identity();
    for commitment in commitments {
        acc += power * commitment;
        power *= point;
    }
    acc
}

impl KexSession {
    /// Start a key exchange as signer `signer_index` of `num_signers`.
    ///
    /// # Errors
    /// `Multisig` on an invalid group shape.
    pub fn new(
        threshold: u32,
        num_signers: u32,
        signer_index: u32,
        rng: &mut (impl RngCore + CryptoRng),
    ) -> WalletResult<Self> {
        check_group_shape(threshold, num_signers, signer_index)?;
        Ok(Self {
            threshold,
            num_signers,
            signer_index,
            coefficients: (0..threshold).map(|_| random_scalar(rng)).collect(),
            k_vb_contribution: random_scalar(rng),
            nonce_seed: random_scalar(rng),
        })
    }

    /// This signer's round-1 broadcast.
    #[must_use]
    pub fn round1(&self) -> KexRound1Message {
        KexRound1Message {
            signer_index: self.signer_index,
            coefficient_commitments: self
                .coefficients
                .iter()
                .map(|coefficient| coefficient * *GEN_U)
                .collect(),
            k_vb_contribution: self.k_vb_contribution,
        }
    }

    fn eval_polynomial(&self, point: &Scalar) -> Scalar {
        let mut power = Scalar::ONE;
        let mut acc = Scalar::ZERO;
        for coefficient in &self.coefficients {
            acc += power * coefficient;
            power *= point;
        }
        acc
    }

    /// The secret share this signer deals to `recipient` (round 2; sent
    /// over a pairwise secure channel).
    #[must_use]
    pub fn share_for(&self, recipient: u32) -> Scalar {
        self.eval_polynomial(&Scalar::from(u64::from(recipient) + 1))
    }

    /// Complete the exchange from everyone's round-1 messages and the
    /// shares received from the other signers.
    ///
    /// # Errors
    /// `Multisig` when messages are missing or malformed, or when a
    /// received share does not open the dealer's commitments.
    pub fn finalize(
        self,
        round1_messages: &[KexRound1Message],
        received_shares: &[(u32, Scalar)],
    ) -> WalletResult<MultisigAccount> {
        let n = self.num_signers as usize;
        let mut by_dealer: Vec<Option<&KexRound1Message>> = vec![None; n];
        for message in round1_messages {
            let index = message.signer_index as usize;
            if index >= n || by_dealer[index].is_some() {
                return Err(WalletError::Multisig(
                    "duplicate or out-of-range round-1 message".into(),
                ));
            }
            if message.coefficient_commitments.len() != self.threshold as usize {
                return Err(WalletError::Multisig(format!(
                    "dealer {} committed to {} coefficients, expected {}",
                    message.signer_index,
                    message.coefficient_commitments.len(),
                    self.threshold
                )));
            }
            by_dealer[index] = Some(message);
        }
        if by_dealer.iter().any(Option::is_none) {
            return Err(WalletError::Multisig("missing round-1 messages".into()));
        }

        // Verify every received share against its dealer's commitments.
        let own_point = Scalar::from(u64::from(self.signer_index) + 1);
        let mut share_from: Vec<Option<Scalar>> = vec![None; n];
        share_from[self.signer_index as usize] = Some(self.eval_polynomial(&own_point));
        for (dealer, value) in received_shares {
            let index = *dealer as usize;
            if index >= n || share_from[index].is_some() {
                return Err(WalletError::Multisig(
                    "duplicate or out-of-range dealt share".into(),
                ));
            }
            let commitments = &by_dealer[index]
                .ok_or_else(|| WalletError::Multisig("missing round-1 messages".into()))?
                .coefficient_commitments;
            if value * *GEN_U != eval_commitments(commitments, &own_point) {
                return Err(WalletError::Multisig(format!(
                    "share from dealer {dealer} does not open its commitments"
                )));
            }
            share_from[index] = Some(*value);
        }
        if share_from.iter().any(Option::is_none) {
            return Err(WalletError::Multisig("missing dealt shares".into()));
        }

        let z_share = share_from
            .iter()
            .flatten()
            .fold(Scalar::ZERO, |acc, share| acc + share);
        let k_vb = by_dealer
            .iter()
            .flatten()
            .fold(Scalar::ZERO, |acc, message| acc + message.k_vb_contribution);

        // Public data: per-signer key shares and the aggregate spend key.
        let share_pubkeys: Vec<EdwardsPoint> = (0..self.num_signers)
            .map(|j| {
                let point = Scalar::from(u64::from(j) + 1);
                by_dealer
                    .iter()
                    .flatten()
                    .fold(EdwardsPoint::identity(), |acc, message| {
                        acc + eval_commitments(&message.coefficient_commitments, &point)
                    })
            })
            .collect();
        let aggregate_spend = by_dealer
            .iter()
            .flatten()
            .fold(EdwardsPoint::identity(), |acc, message| {
                acc + message.coefficient_commitments[0]
            });
        let base_spend_pubkey = k_vb * *GEN_X + aggregate_spend;

        info!(
            threshold = self.threshold,
            signers = self.num_signers,
            signer = self.signer_index,
            "multisig key exchange complete"
        );

        Ok(MultisigAccount {
            threshold: self.threshold,
            num_signers: self.num_signers,
            signer_index: self.signer_index,
            z_share,
            share_pubkeys,
            view_balance: ViewBalanceKeys::derive(k_vb, base_spend_pubkey),
            nonce_seed: self.nonce_seed,
        })
    }
}

impl MultisigAccount {
    /// The aggregate `z·U` component of the base spend key.
    #[must_use]
    pub fn spend_component(&self) -> EdwardsPoint {
        self.view_balance.base_spend_pubkey - self.view_balance.k_vb * *GEN_X
    }

    /// `λ_j·z_j·U`: the Lagrange-weighted public key share of `signer`
    /// within `filter`.
    #[must_use]
    pub fn weighted_share_pubkey(
        &self,
        filter: SignerSetFilter,
        signer: u32,
    ) -> EdwardsPoint {
        lagrange_weight(filter, signer) * self.share_pubkeys[signer as usize]
    }

    /// Check that an aggregate filter can host at least one signing
    /// attempt: it may invite anywhere from `threshold` signers up to the
    /// whole group.
    ///
    /// # Errors
    /// `Multisig` when the filter names outsiders or fewer than
    /// `threshold` signers.
    pub fn check_filter(&self, filter: SignerSetFilter) -> WalletResult<()> {
        let all: u32 = if self.num_signers == 32 {
            u32::MAX
        } else {
            (1 << self.num_signers) - 1
        };
        if filter & !all != 0 {
            return Err(WalletError::Multisig(
                "filter names signers outside the group".into(),
            ));
        }
        if filter.count_ones() < self.threshold {
            return Err(WalletError::Multisig(format!(
                "filter selects {} signers, threshold is {}",
                filter.count_ones(),
                self.threshold
            )));
        }
        Ok(())
    }

    /// The signing attempts this signer participates in: every
    /// threshold-sized subset of `aggregate` containing this signer.
    #[must_use]
    pub fn signing_attempts(&self, aggregate: SignerSetFilter) -> Vec<SignerSetFilter> {
        signer_subsets(self.threshold, self.num_signers)
            .into_iter()
            .filter(|subset| {
                subset & !aggregate == 0 && subset & (1 << self.signer_index) != 0
            })
            .collect()
    }
}

/// Run a full key exchange in-process, returning every signer's account.
/// Exposed for tests and for single-machine multi-party setups.
///
/// # Errors
/// `Multisig` as in [`KexSession::finalize`].
pub fn run_key_exchange(
    threshold: u32,
    num_signers: u32,
    rng: &mut (impl RngCore + CryptoRng),
) -> WalletResult<Vec<MultisigAccount>> {
    let sessions: Vec<KexSession> = (0..num_signers)
        .map(|index| KexSession::new(threshold, num_signers, index, rng))
        .collect::<WalletResult<_>>()?;
    let round1: Vec<KexRound1Message> = sessions.iter().map(KexSession::round1).collect();

    // Deal every pairwise share before any session is consumed.
    let dealt: Vec<Vec<(u32, Scalar)>> = (0..num_signers)
        .map(|recipient| {
            sessions
                .iter()
                .enumerate()
                .filter(|(dealer, _)| *dealer as u32 != recipient)
                .map(|(dealer, session)| (dealer as u32, session.share_for(recipient)))
                .collect()
        })
        .collect();

    sessions
        .into_iter()
        .zip(dealt)
        .map(|(session, shares)| session.finalize(&round1, &shares))
        .collect()
}
