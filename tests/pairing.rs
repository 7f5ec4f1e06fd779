mod common;

use common::{MockConnector, State, UnpairReply};
use microbit_btle::app::{self, AppError};
use microbit_btle::transport::ConnectionConfig;
use microbit_btle::{DeviceError, TransportError};

fn pair(state: State) -> (Result<(), AppError>, String, MockConnector) {
    let mut connector = MockConnector::new(state);
    let mut out = Vec::new();
    let result = app::pair(
        &ConnectionConfig::new("E1:2B:3C:4D:5E:6F"),
        &mut connector,
        &mut out,
    );
    (result, String::from_utf8(out).unwrap(), connector)
}

#[test]
fn not_paired_is_tolerated() {
    let mut state = State::microbit();
    state.unpair_reply = UnpairReply::NotPaired;

    let (result, out, connector) = pair(state);

    result.unwrap();
    assert_eq!(out, "Paired.\n");
    let state = connector.state.borrow();
    assert_eq!(state.unpairs, 1);
    assert_eq!(state.pairs, 1);
    assert_eq!(state.connects, 2);
    assert_eq!(state.disconnects, 2);
}

#[test]
fn existing_bond_is_replaced() {
    let mut state = State::microbit();
    state.unpair_reply = UnpairReply::Ok;

    let (result, out, connector) = pair(state);

    result.unwrap();
    assert_eq!(out, "Paired.\n");
    assert_eq!(connector.state.borrow().pairs, 1);
}

#[test]
fn other_unpair_failures_are_fatal() {
    let mut state = State::microbit();
    state.unpair_reply = UnpairReply::Fail;

    let (result, out, connector) = pair(state);

    assert!(matches!(
        result,
        Err(AppError::Device(DeviceError::Transport(
            TransportError::Disconnected
        )))
    ));
    assert!(out.is_empty());
    let state = connector.state.borrow();
    assert_eq!(state.connects, 1);
    assert_eq!(state.disconnects, 1);
    assert_eq!(state.pairs, 0);
}
