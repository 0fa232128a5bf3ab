//! Core proxy-escalation algorithm.
//!
//! Resolves one incoming event (a manual bid or a proxy-ceiling registration)
//! against an auction snapshot into a new current price, current leader, and the
//! synthetic counter-bids the escalation generated. Pure: no clock, no store,
//! fully deterministic for a given snapshot and event.

use crate::domain::{Amount, Auction, ProxyLimit, TimeMs, UserId};
use crate::engine::BidError;

/// One standing proxy ceiling as seen by the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyStanding {
    pub bidder_id: UserId,
    pub ceiling: Amount,
    /// First registration time; preserved across ceiling replacements so that
    /// equal ceilings resolve in favor of the earlier registrant.
    pub registered_at: TimeMs,
}

impl From<&ProxyLimit> for ProxyStanding {
    fn from(p: &ProxyLimit) -> Self {
        ProxyStanding {
            bidder_id: p.bidder_id.clone(),
            ceiling: p.ceiling,
            registered_at: p.created_at,
        }
    }
}

/// Consistent per-auction view the resolver works against.
///
/// `proxies` must already reflect the upsert when the event is a ceiling
/// registration; the caller persists it only if resolution succeeds.
#[derive(Debug, Clone)]
pub struct AuctionSnapshot {
    pub seller_id: UserId,
    pub start_price: Amount,
    pub bid_increment: Amount,
    pub current_price: Amount,
    pub current_leader: Option<UserId>,
    pub proxies: Vec<ProxyStanding>,
    /// Maximum decimal places accepted for amounts and ceilings.
    pub amount_scale: u32,
}

impl AuctionSnapshot {
    pub fn from_auction(auction: &Auction, proxies: Vec<ProxyStanding>, amount_scale: u32) -> Self {
        AuctionSnapshot {
            seller_id: auction.seller_id.clone(),
            start_price: auction.start_price,
            bid_increment: auction.bid_increment,
            current_price: auction.current_price,
            current_leader: auction.current_leader.clone(),
            proxies,
            amount_scale,
        }
    }

    /// One increment above the current price once any bid exists, otherwise
    /// the start price. Leader presence is the "any bid exists" signal.
    fn minimum_acceptable(&self) -> Amount {
        if self.current_leader.is_some() {
            self.current_price + self.bid_increment
        } else {
            self.start_price
        }
    }
}

/// The incoming submission being resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BidEvent {
    Manual { bidder_id: UserId, amount: Amount },
    ProxyCeiling { bidder_id: UserId, ceiling: Amount },
}

impl BidEvent {
    pub fn bidder_id(&self) -> &UserId {
        match self {
            BidEvent::Manual { bidder_id, .. } => bidder_id,
            BidEvent::ProxyCeiling { bidder_id, .. } => bidder_id,
        }
    }
}

/// A counter-bid the engine places on behalf of a proxy ceiling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntheticBid {
    pub bidder_id: UserId,
    pub amount: Amount,
}

/// Resolved price/leader plus the synthetic bids to append, in ledger order.
/// Every successful resolution has a leader: the incoming event itself
/// contributes a contender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub new_price: Amount,
    pub new_leader: UserId,
    pub synthetic_bids: Vec<SyntheticBid>,
}

/// One party contesting the lead: the standing leader, a proxy holder, or the
/// incoming manual bidder. `rank` orders ties: the standing leader ranks
/// earliest (its lead predates the event), proxies rank by first registration,
/// and an incoming manual bid ranks latest.
#[derive(Debug, Clone)]
struct Contender {
    bidder_id: UserId,
    max: Amount,
    rank: (i64, String),
    /// True when this party's max comes from a proxy ceiling the engine may
    /// author synthetic bids for. The incoming manual bidder is never
    /// proxy-backed here even if they also hold a ceiling, since their manual
    /// ledger entry already records the push.
    proxy_backed: bool,
}

/// Resolve `event` against `snapshot`.
///
/// # Errors
/// Returns the typed validation failure without touching any state; the caller
/// must not persist anything on error.
pub fn resolve(snapshot: &AuctionSnapshot, event: &BidEvent) -> Result<Resolution, BidError> {
    validate(snapshot, event)?;

    let contenders = build_contenders(snapshot, event);
    debug_assert!(!contenders.is_empty(), "event always contributes a contender");

    let (winner, runner_up) = pick_winner(contenders);

    let previous_price = snapshot.current_price;
    let previous_leader = snapshot.current_leader.clone();

    let is_incoming_manual = matches!(event, BidEvent::Manual { bidder_id, .. } if bidder_id == &winner.bidder_id && !winner.proxy_backed);

    let new_price = if is_incoming_manual {
        // A winning manual bid stands at its full amount; proxies below it
        // stop participating silently.
        winner.max
    } else {
        // Second-price rule: one increment above the best losing offer, capped
        // at the winner's own ceiling, never regressing.
        let contested = match &runner_up {
            Some(r) => std::cmp::min(winner.max, r.max + snapshot.bid_increment),
            None => snapshot.start_price,
        };
        std::cmp::max(contested, previous_price)
    };

    let mut synthetic_bids = Vec::new();
    let leader_unchanged = previous_leader.as_ref() == Some(&winner.bidder_id);
    let changed = !leader_unchanged || new_price > previous_price;

    if winner.proxy_backed && changed {
        // Losing proxy's last push, collapsed to a single ledger entry at its
        // ceiling. Skipped when it never rose above the pre-event price.
        if let Some(runner) = &runner_up {
            if runner.proxy_backed && runner.max > previous_price && runner.max < new_price {
                synthetic_bids.push(SyntheticBid {
                    bidder_id: runner.bidder_id.clone(),
                    amount: runner.max,
                });
            }
        }
        synthetic_bids.push(SyntheticBid {
            bidder_id: winner.bidder_id.clone(),
            amount: new_price,
        });
    }

    Ok(Resolution {
        new_price,
        new_leader: winner.bidder_id,
        synthetic_bids,
    })
}

fn validate(snapshot: &AuctionSnapshot, event: &BidEvent) -> Result<(), BidError> {
    if event.bidder_id() == &snapshot.seller_id {
        return Err(BidError::SelfDealing);
    }

    let value = match event {
        BidEvent::Manual { amount, .. } => *amount,
        BidEvent::ProxyCeiling { ceiling, .. } => *ceiling,
    };
    if !value.is_valid_money(snapshot.amount_scale) {
        return Err(BidError::InvalidAmount);
    }

    let minimum = snapshot.minimum_acceptable();
    if value < minimum {
        return Err(BidError::BidTooLow { minimum });
    }

    if let BidEvent::Manual { bidder_id, .. } = event {
        if snapshot.current_leader.as_ref() == Some(bidder_id) {
            return Err(BidError::AlreadyLeading);
        }
    }

    Ok(())
}

fn build_contenders(snapshot: &AuctionSnapshot, event: &BidEvent) -> Vec<Contender> {
    let mut contenders: Vec<Contender> = Vec::with_capacity(snapshot.proxies.len() + 2);

    for proxy in &snapshot.proxies {
        contenders.push(Contender {
            bidder_id: proxy.bidder_id.clone(),
            max: proxy.ceiling,
            rank: (proxy.registered_at.as_i64(), proxy.bidder_id.0.clone()),
            proxy_backed: true,
        });
    }

    if let Some(leader) = &snapshot.current_leader {
        // The leader's standing price and their own ceiling (if any) merge into
        // one contender that wins every tie: its lead predates the event.
        let merged = merge_bidder(
            &mut contenders,
            leader,
            snapshot.current_price,
            (i64::MIN, String::new()),
        );
        if !merged {
            contenders.push(Contender {
                bidder_id: leader.clone(),
                max: snapshot.current_price,
                rank: (i64::MIN, String::new()),
                proxy_backed: false,
            });
        }
    }

    if let BidEvent::Manual { bidder_id, amount } = event {
        // An incoming manual bid ranks latest, so it loses ties against any
        // standing ceiling. Its push is the manual ledger entry itself, never a
        // synthetic bid, even when merged with the bidder's own ceiling.
        let merged = merge_bidder(&mut contenders, bidder_id, *amount, (i64::MAX, String::new()));
        if merged {
            if let Some(c) = contenders.iter_mut().find(|c| &c.bidder_id == bidder_id) {
                c.proxy_backed = false;
            }
        } else {
            contenders.push(Contender {
                bidder_id: bidder_id.clone(),
                max: *amount,
                rank: (i64::MAX, String::new()),
                proxy_backed: false,
            });
        }
    }

    contenders
}

/// Fold `max`/`rank` into an existing contender for `bidder`, if one exists.
fn merge_bidder(
    contenders: &mut [Contender],
    bidder: &UserId,
    max: Amount,
    rank: (i64, String),
) -> bool {
    if let Some(c) = contenders.iter_mut().find(|c| &c.bidder_id == bidder) {
        if max > c.max {
            c.max = max;
        }
        if rank < c.rank {
            c.rank = rank;
        }
        true
    } else {
        false
    }
}

fn pick_winner(mut contenders: Vec<Contender>) -> (Contender, Option<Contender>) {
    contenders.sort_by(|a, b| b.max.cmp(&a.max).then_with(|| a.rank.cmp(&b.rank)));
    let mut iter = contenders.into_iter();
    let winner = iter.next().expect("contenders is non-empty");
    (winner, iter.next())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn amount(s: &str) -> Amount {
        Amount::from_str(s).unwrap()
    }

    fn user(s: &str) -> UserId {
        UserId::new(s.to_string())
    }

    fn snapshot() -> AuctionSnapshot {
        AuctionSnapshot {
            seller_id: user("seller"),
            start_price: amount("100"),
            bid_increment: amount("10"),
            current_price: amount("100"),
            current_leader: None,
            proxies: vec![],
            amount_scale: 2,
        }
    }

    fn proxy(bidder: &str, ceiling: &str, registered_at: i64) -> ProxyStanding {
        ProxyStanding {
            bidder_id: user(bidder),
            ceiling: amount(ceiling),
            registered_at: TimeMs::new(registered_at),
        }
    }

    fn manual(bidder: &str, amt: &str) -> BidEvent {
        BidEvent::Manual {
            bidder_id: user(bidder),
            amount: amount(amt),
        }
    }

    fn ceiling(bidder: &str, c: &str) -> BidEvent {
        BidEvent::ProxyCeiling {
            bidder_id: user(bidder),
            ceiling: amount(c),
        }
    }

    #[test]
    fn test_first_manual_bid_stands_at_its_amount() {
        let snap = snapshot();
        let res = resolve(&snap, &manual("a", "100")).unwrap();
        assert_eq!(res.new_price, amount("100"));
        assert_eq!(res.new_leader, user("a"));
        assert!(res.synthetic_bids.is_empty());
    }

    #[test]
    fn test_seller_cannot_bid() {
        let snap = snapshot();
        let err = resolve(&snap, &manual("seller", "100")).unwrap_err();
        assert!(matches!(err, BidError::SelfDealing));
    }

    #[test]
    fn test_seller_cannot_register_proxy() {
        let snap = snapshot();
        let err = resolve(&snap, &ceiling("seller", "500")).unwrap_err();
        assert!(matches!(err, BidError::SelfDealing));
    }

    #[test]
    fn test_manual_bid_below_start_price_rejected() {
        let snap = snapshot();
        let err = resolve(&snap, &manual("a", "99")).unwrap_err();
        assert!(matches!(err, BidError::BidTooLow { .. }));
    }

    #[test]
    fn test_manual_bid_below_increment_rejected() {
        let mut snap = snapshot();
        snap.current_leader = Some(user("a"));
        snap.current_price = amount("100");

        let err = resolve(&snap, &manual("b", "105")).unwrap_err();
        match err {
            BidError::BidTooLow { minimum } => assert_eq!(minimum, amount("110")),
            other => panic!("expected BidTooLow, got {:?}", other),
        }
    }

    #[test]
    fn test_negative_and_overscaled_amounts_rejected() {
        let snap = snapshot();
        assert!(matches!(
            resolve(&snap, &manual("a", "-100")).unwrap_err(),
            BidError::InvalidAmount
        ));
        assert!(matches!(
            resolve(&snap, &manual("a", "100.001")).unwrap_err(),
            BidError::InvalidAmount
        ));
        assert!(matches!(
            resolve(&snap, &ceiling("a", "0")).unwrap_err(),
            BidError::InvalidAmount
        ));
    }

    #[test]
    fn test_current_leader_cannot_outbid_themselves() {
        let mut snap = snapshot();
        snap.current_leader = Some(user("a"));

        let err = resolve(&snap, &manual("a", "150")).unwrap_err();
        assert!(matches!(err, BidError::AlreadyLeading));
    }

    #[test]
    fn test_proxy_registration_counter_bids_manual_leader() {
        // A leads at 100, B registers ceiling 150 -> B leads at 110.
        let mut snap = snapshot();
        snap.current_leader = Some(user("a"));
        snap.current_price = amount("100");
        snap.proxies = vec![proxy("b", "150", 5)];

        let res = resolve(&snap, &ceiling("b", "150")).unwrap();
        assert_eq!(res.new_price, amount("110"));
        assert_eq!(res.new_leader, user("b"));
        assert_eq!(
            res.synthetic_bids,
            vec![SyntheticBid {
                bidder_id: user("b"),
                amount: amount("110"),
            }]
        );
    }

    #[test]
    fn test_standing_proxy_outbids_manual_challenger() {
        // B leads at 110 with ceiling 150, A bids 140
        // manually -> B's proxy counters at min(150, 140+10) = 150.
        let mut snap = snapshot();
        snap.current_leader = Some(user("b"));
        snap.current_price = amount("110");
        snap.proxies = vec![proxy("b", "150", 5)];

        let res = resolve(&snap, &manual("a", "140")).unwrap();
        assert_eq!(res.new_price, amount("150"));
        assert_eq!(res.new_leader, user("b"));
        assert_eq!(
            res.synthetic_bids,
            vec![SyntheticBid {
                bidder_id: user("b"),
                amount: amount("150"),
            }]
        );
    }

    #[test]
    fn test_manual_above_standing_ceiling_takes_lead_at_full_amount() {
        let mut snap = snapshot();
        snap.current_leader = Some(user("b"));
        snap.current_price = amount("110");
        snap.proxies = vec![proxy("b", "150", 5)];

        let res = resolve(&snap, &manual("a", "200")).unwrap();
        assert_eq!(res.new_price, amount("200"));
        assert_eq!(res.new_leader, user("a"));
        // The overtaken proxy stops silently; the manual entry is the push.
        assert!(res.synthetic_bids.is_empty());
    }

    #[test]
    fn test_first_proxy_on_empty_auction_leads_at_start_price() {
        let snap_with_proxy = AuctionSnapshot {
            proxies: vec![proxy("c", "200", 1)],
            ..snapshot()
        };

        let res = resolve(&snap_with_proxy, &ceiling("c", "200")).unwrap();
        assert_eq!(res.new_price, amount("100"));
        assert_eq!(res.new_leader, user("c"));
        assert_eq!(
            res.synthetic_bids,
            vec![SyntheticBid {
                bidder_id: user("c"),
                amount: amount("100"),
            }]
        );
    }

    #[test]
    fn test_two_proxies_settle_one_increment_above_runner_up() {
        // C ceiling 200 leads at 100, D registers 180 ->
        // C defends at 190 = 180 + 10, capped at 200.
        let mut snap = snapshot();
        snap.current_leader = Some(user("c"));
        snap.current_price = amount("100");
        snap.proxies = vec![proxy("c", "200", 1), proxy("d", "180", 2)];

        let res = resolve(&snap, &ceiling("d", "180")).unwrap();
        assert_eq!(res.new_price, amount("190"));
        assert_eq!(res.new_leader, user("c"));
        assert_eq!(
            res.synthetic_bids,
            vec![
                SyntheticBid {
                    bidder_id: user("d"),
                    amount: amount("180"),
                },
                SyntheticBid {
                    bidder_id: user("c"),
                    amount: amount("190"),
                },
            ]
        );
    }

    #[test]
    fn test_equal_ceilings_favor_earlier_registration() {
        let mut snap = snapshot();
        snap.current_leader = Some(user("c"));
        snap.current_price = amount("100");
        snap.proxies = vec![proxy("c", "200", 1), proxy("d", "200", 2)];

        let res = resolve(&snap, &ceiling("d", "200")).unwrap();
        assert_eq!(res.new_price, amount("200"));
        assert_eq!(res.new_leader, user("c"));
        // D pushes to its ceiling and loses the tie; C defends at the same amount.
        assert_eq!(
            res.synthetic_bids.last().map(|s| s.bidder_id.clone()),
            Some(user("c"))
        );
    }

    #[test]
    fn test_manual_tying_standing_ceiling_loses_to_it() {
        // Earlier-registered party wins ties: P holds ceiling 150 and leads at
        // 120; M's manual 150 is countered at exactly 150 by P.
        let mut snap = snapshot();
        snap.current_leader = Some(user("p"));
        snap.current_price = amount("120");
        snap.proxies = vec![proxy("p", "150", 1)];

        let res = resolve(&snap, &manual("m", "150")).unwrap();
        assert_eq!(res.new_price, amount("150"));
        assert_eq!(res.new_leader, user("p"));
        assert_eq!(
            res.synthetic_bids,
            vec![SyntheticBid {
                bidder_id: user("p"),
                amount: amount("150"),
            }]
        );
    }

    #[test]
    fn test_new_proxy_overtakes_proxy_backed_leader() {
        let mut snap = snapshot();
        snap.current_leader = Some(user("p"));
        snap.current_price = amount("110");
        snap.proxies = vec![proxy("p", "150", 1), proxy("q", "300", 2)];

        let res = resolve(&snap, &ceiling("q", "300")).unwrap();
        assert_eq!(res.new_price, amount("160"));
        assert_eq!(res.new_leader, user("q"));
        // P defends up to its ceiling, then Q counters one increment above.
        assert_eq!(
            res.synthetic_bids,
            vec![
                SyntheticBid {
                    bidder_id: user("p"),
                    amount: amount("150"),
                },
                SyntheticBid {
                    bidder_id: user("q"),
                    amount: amount("160"),
                },
            ]
        );
    }

    #[test]
    fn test_reregistering_same_ceiling_is_idempotent() {
        let mut snap = snapshot();
        snap.current_leader = Some(user("b"));
        snap.current_price = amount("110");
        snap.proxies = vec![proxy("b", "150", 5)];

        let res = resolve(&snap, &ceiling("b", "150")).unwrap();
        assert_eq!(res.new_price, amount("110"));
        assert_eq!(res.new_leader, user("b"));
        assert!(res.synthetic_bids.is_empty());
    }

    #[test]
    fn test_leader_raising_own_ceiling_does_not_move_price() {
        let mut snap = snapshot();
        snap.current_leader = Some(user("c"));
        snap.current_price = amount("190");
        snap.proxies = vec![proxy("c", "300", 1), proxy("d", "180", 2)];

        let res = resolve(&snap, &ceiling("c", "300")).unwrap();
        assert_eq!(res.new_price, amount("190"));
        assert_eq!(res.new_leader, user("c"));
        assert!(res.synthetic_bids.is_empty());
    }

    #[test]
    fn test_proxy_ceiling_below_minimum_rejected() {
        let mut snap = snapshot();
        snap.current_leader = Some(user("a"));
        snap.current_price = amount("200");

        let err = resolve(&snap, &ceiling("b", "205")).unwrap_err();
        assert!(matches!(err, BidError::BidTooLow { .. }));
    }

    #[test]
    fn test_manual_by_overtaken_proxy_holder_merges_with_own_ceiling() {
        // D holds ceiling 180 but C leads at 190 with ceiling 200. D manually
        // bids 200: the tie goes to C (earlier), price reaches 200.
        let mut snap = snapshot();
        snap.current_leader = Some(user("c"));
        snap.current_price = amount("190");
        snap.proxies = vec![proxy("c", "200", 1), proxy("d", "180", 2)];

        let res = resolve(&snap, &manual("d", "200")).unwrap();
        assert_eq!(res.new_price, amount("200"));
        assert_eq!(res.new_leader, user("c"));
        assert_eq!(
            res.synthetic_bids,
            vec![SyntheticBid {
                bidder_id: user("c"),
                amount: amount("200"),
            }]
        );
    }

    #[test]
    fn test_price_never_decreases() {
        // A stale low ceiling re-registered must not drag the price down.
        let mut snap = snapshot();
        snap.current_leader = Some(user("c"));
        snap.current_price = amount("190");
        snap.proxies = vec![proxy("c", "400", 1), proxy("d", "195", 2)];

        let res = resolve(&snap, &ceiling("d", "195")).unwrap_err();
        // 195 < 190 + 10, so the registration itself is rejected.
        assert!(matches!(res, BidError::BidTooLow { .. }));

        snap.proxies[1].ceiling = amount("250");
        let res = resolve(&snap, &ceiling("d", "250")).unwrap();
        assert!(res.new_price >= amount("190"));
        assert_eq!(res.new_price, amount("260"));
        assert_eq!(res.new_leader, user("c"));
    }

    #[test]
    fn test_escalation_sequence_is_monotonic() {
        // Replay a mixed sequence and assert prices never decrease.
        let mut snap = snapshot();
        let mut last = snap.current_price;

        let events = vec![
            manual("a", "100"),
            ceiling("b", "150"),
            manual("a", "140"),
            ceiling("e", "180"),
            manual("f", "500"),
        ];

        for (i, event) in events.into_iter().enumerate() {
            if let BidEvent::ProxyCeiling { bidder_id, ceiling } = &event {
                snap.proxies.push(ProxyStanding {
                    bidder_id: bidder_id.clone(),
                    ceiling: *ceiling,
                    registered_at: TimeMs::new(i as i64),
                });
            }
            let res = resolve(&snap, &event).unwrap();
            assert!(res.new_price >= last, "price regressed at step {}", i);
            assert!(res.new_price >= snap.start_price);
            last = res.new_price;
            snap.current_price = res.new_price;
            snap.current_leader = Some(res.new_leader);
        }

        assert_eq!(snap.current_price, amount("500"));
        assert_eq!(snap.current_leader, Some(user("f")));
    }

    #[test]
    fn test_no_synthetic_bid_ever_exceeds_its_ceiling() {
        let mut snap = snapshot();
        snap.current_leader = Some(user("c"));
        snap.current_price = amount("100");
        snap.proxies = vec![proxy("c", "205", 1), proxy("d", "198", 2)];

        let res = resolve(&snap, &ceiling("d", "198")).unwrap();
        assert_eq!(res.new_price, amount("205"));
        for synthetic in &res.synthetic_bids {
            let ceiling = snap
                .proxies
                .iter()
                .find(|p| p.bidder_id == synthetic.bidder_id)
                .map(|p| p.ceiling)
                .unwrap();
            assert!(synthetic.amount <= ceiling);
        }
    }
}
