mod test_utils;

use anonticket_protocol::{
    user::Presentation,
    wire::{self, label},
    CryptoContext, Error, Party, ProtocolDescriptor, Seed, SharedRunContext, Step,
    ValidationOutcome,
};
use test_utils::*;

#[test]
fn verifiers_validate_each_others_tags_after_rekeying() {
    let mut context = setup(ProtocolDescriptor::anon_proxy(), profile("alice", 30, "none"));
    register(&mut context, Party::User).unwrap();
    buy_ticket(&mut context).unwrap();
    assert_eq!(context.held_ticket().unwrap().policy().price, 10);

    // The re-key is fetched on first use and cached afterwards.
    assert!(context
        .verifier("entrance")
        .unwrap()
        .needs_rekey("backstage")
        .is_some());
    assert_eq!(
        validate(&mut context, "entrance", "backstage"),
        Ok(ValidationOutcome::Valid)
    );
    assert!(context
        .verifier("entrance")
        .unwrap()
        .needs_rekey("backstage")
        .is_none());

    // The delegate keeps its own ledger for the slot.
    assert!(validate(&mut context, "entrance", "backstage")
        .unwrap()
        .is_double_spend());
    assert_eq!(
        validate(&mut context, "backstage", "backstage"),
        Ok(ValidationOutcome::Valid)
    );
}

#[test]
fn rekeys_can_be_exchanged_as_messages() {
    let mut context = setup(ProtocolDescriptor::anon_proxy(), profile("bob", 30, "none"));
    register(&mut context, Party::User).unwrap();
    buy_ticket(&mut context).unwrap();

    let _ = run(
        &mut context,
        &[
            Step::RequestReKey {
                verifier: "backstage".to_string(),
                slot: "entrance".to_string(),
            },
            Step::IssueReKey,
            Step::AcceptReKey("backstage".to_string()),
        ],
        ack(),
    )
    .unwrap();
    assert!(matches!(
        context.handle_incoming(
            &Step::RequestReKey {
                verifier: "backstage".to_string(),
                slot: "entrance".to_string(),
            },
            &ack()
        ),
        Err(Error::UnexpectedStep(_))
    ));
    assert_eq!(
        validate(&mut context, "backstage", "entrance"),
        Ok(ValidationOutcome::Valid)
    );

    // A re-key addressed to someone else is refused.
    let rekey = run(
        &mut context,
        &[
            Step::RequestReKey {
                verifier: "entrance".to_string(),
                slot: "backstage".to_string(),
            },
            Step::IssueReKey,
        ],
        ack(),
    )
    .unwrap();
    assert!(matches!(
        context.handle_incoming(&Step::AcceptReKey("backstage".to_string()), &rekey),
        Err(Error::DelegationUnavailable(_))
    ));
}

#[test]
fn delegation_is_off_unless_configured() {
    let mut context = setup(ProtocolDescriptor::ppets_abc(), profile("carol", 30, "none"));
    register(&mut context, Party::User).unwrap();
    buy_ticket(&mut context).unwrap();
    assert!(matches!(
        validate(&mut context, "gate-a", "gate-b"),
        Err(Error::DelegationUnavailable(_))
    ));
}

#[test]
fn persisted_parameters_without_trapdoor_cannot_delegate() {
    init_logging();
    let (fresh, _) = CryptoContext::new(2, Seed::Entropy);
    let json = fresh.params.to_json().unwrap();
    let crypto = CryptoContext::from_json(&json, Seed::Entropy).unwrap();
    let mut context = SharedRunContext::with_context(
        ProtocolDescriptor::anon_proxy(),
        profile("dave", 30, "none"),
        crypto,
        None,
    )
    .unwrap();
    enroll_all(&mut context);
    register(&mut context, Party::User).unwrap();
    buy_ticket(&mut context).unwrap();

    assert_eq!(
        validate(&mut context, "entrance", "entrance"),
        Ok(ValidationOutcome::Valid)
    );
    assert!(matches!(
        validate(&mut context, "entrance", "backstage"),
        Err(Error::DelegationUnavailable(_))
    ));
}

fn sso_presentation(context: &mut SharedRunContext, verifier: &str) -> Presentation {
    let bytes = run(
        context,
        &[
            Step::Challenge {
                verifier: verifier.to_string(),
                slot: verifier.to_string(),
            },
            Step::Present,
        ],
        ack(),
    )
    .unwrap();
    let presentation: Presentation = wire::open(label::PRESENTATION, &bytes).unwrap();
    let _ = context
        .handle_incoming(&Step::Validate(verifier.to_string()), &bytes)
        .unwrap();
    presentation
}

#[test]
fn single_sign_on_uses_one_pseudonym_per_service() {
    let mut context = setup(ProtocolDescriptor::anon_sso(), profile("erin", 30, "none"));
    register(&mut context, Party::User).unwrap();
    buy_ticket(&mut context).unwrap();
    assert_eq!(context.held_ticket().unwrap().policy().price, 0);

    let mail = sso_presentation(&mut context, "mail").verifier_pseudonym;
    let calendar = sso_presentation(&mut context, "calendar").verifier_pseudonym;
    assert!(mail.is_some());
    assert!(calendar.is_some());
    assert_ne!(mail, calendar);

    // A fresh ticket signs in under the same service pseudonym.
    buy_ticket(&mut context).unwrap();
    assert_eq!(sso_presentation(&mut context, "mail").verifier_pseudonym, mail);
}
