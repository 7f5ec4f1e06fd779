#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::time::Duration;

use microbit_btle::transport::{
    ConnectionConfig, Connector, SecurityLevel, Transport, TransportError,
};
use microbit_btle::uuids::{self, microbit_uuid};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub enum Reply {
    Bytes(Vec<u8>),
    Disconnected,
}

#[derive(Debug, Clone, Copy)]
pub enum UnpairReply {
    Ok,
    NotPaired,
    Fail,
}

/// Everything the mock saw, shared between the connector and its transports.
#[derive(Debug)]
pub struct State {
    pub services: Vec<(Uuid, Vec<Uuid>)>,
    /// The last reply of each queue repeats.
    pub replies: HashMap<Uuid, VecDeque<Reply>>,
    pub unpair_reply: UnpairReply,
    pub refuse_connect: bool,

    pub connects: usize,
    pub disconnects: usize,
    pub service_lookups: usize,
    pub characteristic_lookups: usize,
    pub reads: Vec<Uuid>,
    pub security: Vec<SecurityLevel>,
    pub pairs: usize,
    pub unpairs: usize,
    pub waits: Vec<Duration>,
}

impl State {
    /// A micro:bit exposing temperature, accelerometer, buttons and magnetometer.
    pub fn microbit() -> Self {
        let service = |svc: u16, chars: &[u16]| {
            (
                microbit_uuid(svc),
                chars.iter().map(|c| microbit_uuid(*c)).collect(),
            )
        };
        State {
            services: vec![
                service(uuids::TEMP_SERVICE, &[uuids::TEMP_DATA, uuids::TEMP_PERIOD]),
                service(uuids::ACCEL_SERVICE, &[uuids::ACCEL_DATA, uuids::ACCEL_PERIOD]),
                service(uuids::BTN_SERVICE, &[uuids::BTN_A_STATE, uuids::BTN_B_STATE]),
                service(
                    uuids::MAGNETO_SERVICE,
                    &[uuids::MAGNETO_DATA, uuids::MAGNETO_BEARING],
                ),
            ],
            replies: HashMap::new(),
            unpair_reply: UnpairReply::NotPaired,
            refuse_connect: false,
            connects: 0,
            disconnects: 0,
            service_lookups: 0,
            characteristic_lookups: 0,
            reads: Vec::new(),
            security: Vec::new(),
            pairs: 0,
            unpairs: 0,
            waits: Vec::new(),
        }
    }

    pub fn reply(&mut self, characteristic: u16, replies: Vec<Reply>) {
        self.replies
            .insert(microbit_uuid(characteristic), replies.into_iter().collect());
    }

    pub fn without_characteristic(mut self, characteristic: u16) -> Self {
        let uuid = microbit_uuid(characteristic);
        for (_, chars) in &mut self.services {
            chars.retain(|c| *c != uuid);
        }
        self
    }

    pub fn without_service(mut self, service: u16) -> Self {
        let uuid = microbit_uuid(service);
        self.services.retain(|(s, _)| *s != uuid);
        self
    }
}

pub type Shared = Rc<RefCell<State>>;

pub struct MockConnector {
    pub state: Shared,
}

impl MockConnector {
    pub fn new(state: State) -> Self {
        MockConnector {
            state: Rc::new(RefCell::new(state)),
        }
    }
}

impl Connector for MockConnector {
    type Transport = MockTransport;

    fn connect(&mut self, config: &ConnectionConfig) -> Result<MockTransport, TransportError> {
        let mut state = self.state.borrow_mut();
        if state.refuse_connect {
            return Err(TransportError::DeviceNotFound(config.address.clone()));
        }
        state.connects += 1;
        Ok(MockTransport {
            state: self.state.clone(),
        })
    }
}

pub struct MockTransport {
    pub state: Shared,
}

impl MockTransport {
    pub fn new(state: State) -> Self {
        MockTransport {
            state: Rc::new(RefCell::new(state)),
        }
    }
}

impl Transport for MockTransport {
    type Service = Uuid;
    type Characteristic = Uuid;

    fn find_service(&mut self, uuid: Uuid) -> Result<Option<Uuid>, TransportError> {
        let mut state = self.state.borrow_mut();
        state.service_lookups += 1;
        Ok(state
            .services
            .iter()
            .find(|(s, _)| *s == uuid)
            .map(|(s, _)| *s))
    }

    fn find_characteristic(
        &mut self,
        service: &Uuid,
        uuid: Uuid,
    ) -> Result<Option<Uuid>, TransportError> {
        let mut state = self.state.borrow_mut();
        state.characteristic_lookups += 1;
        Ok(state
            .services
            .iter()
            .find(|(s, _)| s == service)
            .and_then(|(_, chars)| chars.iter().find(|c| **c == uuid).copied()))
    }

    fn read(&mut self, characteristic: &Uuid) -> Result<Vec<u8>, TransportError> {
        let mut state = self.state.borrow_mut();
        state.reads.push(*characteristic);
        let queue = state
            .replies
            .get_mut(characteristic)
            .expect("no reply configured for characteristic");
        let reply = if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue.front().cloned().expect("empty reply queue")
        };
        match reply {
            Reply::Bytes(bytes) => Ok(bytes),
            Reply::Disconnected => Err(TransportError::Disconnected),
        }
    }

    fn set_security(&mut self, level: SecurityLevel) -> Result<(), TransportError> {
        self.state.borrow_mut().security.push(level);
        Ok(())
    }

    fn pair(&mut self) -> Result<(), TransportError> {
        self.state.borrow_mut().pairs += 1;
        Ok(())
    }

    fn unpair(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.borrow_mut();
        state.unpairs += 1;
        match state.unpair_reply {
            UnpairReply::Ok => Ok(()),
            UnpairReply::NotPaired => Err(TransportError::NotPaired),
            UnpairReply::Fail => Err(TransportError::Disconnected),
        }
    }

    fn wait_for_notifications(&mut self, timeout: Duration) -> Result<bool, TransportError> {
        self.state.borrow_mut().waits.push(timeout);
        Ok(false)
    }

    fn disconnect(&mut self) -> Result<(), TransportError> {
        self.state.borrow_mut().disconnects += 1;
        Ok(())
    }
}
