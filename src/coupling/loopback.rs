//! In-process coupling runtime.
//!
//! Components of a `Topology` are connected by unbounded crossbeam channels,
//! one per conduit. Each component gets a `LoopbackInstance` that can be moved
//! to its own thread.
//!
//! Reuse follows the coupling runtime's rules: an instance with connected
//! `F_INIT` ports reuses as long as every one of them delivers a message (the
//! messages are pre-received and handed out by `receive`); an instance
//! without them reuses exactly once. Dropping an instance closes its
//! conduits, which its peers observe as the end of reuse.

use std::collections::{BTreeMap, HashMap};

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, trace};

use crate::error::CouplingError;
use crate::ports::{Operator, PortName};

use super::{CouplingInstance, Message, SettingValue};

#[derive(Debug, Clone, Default)]
struct ComponentSpec {
    ports: BTreeMap<String, Operator>,
}

/// Declarative description of a coupled model.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    components: BTreeMap<String, ComponentSpec>,
    conduits: Vec<(String, String)>,
    global_settings: BTreeMap<String, SettingValue>,
    component_settings: BTreeMap<String, BTreeMap<String, SettingValue>>,
}

fn split_endpoint(endpoint: &str) -> Result<(&str, &str), CouplingError> {
    endpoint
        .split_once('.')
        .ok_or_else(|| CouplingError::UndeclaredPort {
            port: endpoint.to_string(),
        })
}

impl Topology {
    /// Creates an empty topology.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a component and its ports, grouped by operator.
    #[must_use]
    pub fn component<S: AsRef<str>>(
        mut self,
        name: impl Into<String>,
        ports: impl IntoIterator<Item = (Operator, Vec<S>)>,
    ) -> Self {
        let component = self.components.entry(name.into()).or_default();
        for (op, names) in ports {
            for port in names {
                component.ports.insert(port.as_ref().to_string(), op);
            }
        }
        self
    }

    /// Connects `sender` (`component.port`) to `receiver` (`component.port`).
    #[must_use]
    pub fn conduit(mut self, sender: impl Into<String>, receiver: impl Into<String>) -> Self {
        self.conduits.push((sender.into(), receiver.into()));
        self
    }

    /// Adds a setting visible to every component.
    #[must_use]
    pub fn setting(mut self, name: impl Into<String>, value: impl Into<SettingValue>) -> Self {
        self.global_settings.insert(name.into(), value.into());
        self
    }

    /// Adds a setting visible to one component; it shadows a global setting of the same name.
    #[must_use]
    pub fn component_setting(
        mut self,
        component: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<SettingValue>,
    ) -> Self {
        self.component_settings
            .entry(component.into())
            .or_default()
            .insert(name.into(), value.into());
        self
    }

    fn operator_of(&self, endpoint: &str) -> Result<(String, String, Operator), CouplingError> {
        let (component, port) = split_endpoint(endpoint)?;
        let op = self
            .components
            .get(component)
            .and_then(|declared| declared.ports.get(port))
            .copied()
            .ok_or_else(|| CouplingError::UndeclaredPort {
                port: endpoint.to_string(),
            })?;
        Ok((component.to_string(), port.to_string(), op))
    }

    fn check_port_names(&self) -> Result<(), CouplingError> {
        for (component, declared) in &self.components {
            for (port, &operator) in &declared.ports {
                if let Some(named) = PortName::parse(port)? {
                    if named.operator != operator {
                        return Err(CouplingError::MisdeclaredPort {
                            port: format!("{component}.{port}"),
                            named: named.operator.to_string(),
                            declared: operator.to_string(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Wires the conduits and returns one instance per component.
    ///
    /// # Errors
    ///
    /// `UndeclaredPort` if a conduit names an unknown endpoint, sends from a
    /// receiving port or delivers into a sending port. `MisdeclaredPort` if a
    /// `{kind}_{operator}` port is declared under another operator.
    pub fn build(self) -> Result<BTreeMap<String, LoopbackInstance>, CouplingError> {
        self.check_port_names()?;
        let mut instances: BTreeMap<String, LoopbackInstance> = self
            .components
            .iter()
            .map(|(name, component)| {
                let mut settings = self.global_settings.clone();
                if let Some(own) = self.component_settings.get(name) {
                    settings.extend(own.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
                let instance = LoopbackInstance {
                    name: name.clone(),
                    ports: component.ports.clone(),
                    outgoing: HashMap::new(),
                    incoming: HashMap::new(),
                    settings,
                    pending: HashMap::new(),
                    reuses: 0,
                };
                (name.clone(), instance)
            })
            .collect();

        for (sender, receiver) in &self.conduits {
            let (from_component, from_port, from_op) = self.operator_of(sender)?;
            let (to_component, to_port, to_op) = self.operator_of(receiver)?;
            if from_op.is_receiving() {
                return Err(CouplingError::UndeclaredPort { port: sender.clone() });
            }
            if !to_op.is_receiving() {
                return Err(CouplingError::UndeclaredPort {
                    port: receiver.clone(),
                });
            }

            let (tx, rx) = unbounded();
            if let Some(instance) = instances.get_mut(&from_component) {
                instance.outgoing.insert(from_port, tx);
            }
            if let Some(instance) = instances.get_mut(&to_component) {
                instance.incoming.insert(to_port, rx);
            }
        }

        Ok(instances)
    }
}

/// A component instance wired by a `Topology`.
#[derive(Debug)]
pub struct LoopbackInstance {
    name: String,
    ports: BTreeMap<String, Operator>,
    outgoing: HashMap<String, Sender<Message>>,
    incoming: HashMap<String, Receiver<Message>>,
    settings: BTreeMap<String, SettingValue>,
    pending: HashMap<String, Message>,
    reuses: usize,
}

impl LoopbackInstance {
    /// Component name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of times `reuse_instance` returned true.
    #[must_use]
    pub const fn reuses(&self) -> usize {
        self.reuses
    }

    fn check_declared(&self, port: &str) -> Result<(), CouplingError> {
        if self.ports.contains_key(port) {
            Ok(())
        } else {
            Err(CouplingError::UndeclaredPort {
                port: format!("{}.{port}", self.name),
            })
        }
    }

    fn connected_f_init_ports(&self) -> Vec<String> {
        self.ports
            .iter()
            .filter(|(port, op)| **op == Operator::FInit && self.incoming.contains_key(*port))
            .map(|(port, _)| port.clone())
            .collect()
    }
}

impl CouplingInstance for LoopbackInstance {
    fn reuse_instance(&mut self) -> bool {
        let f_init = self.connected_f_init_ports();
        if f_init.is_empty() {
            let reuse = self.reuses == 0;
            if reuse {
                self.reuses += 1;
            }
            debug!("{}: reuse without F_INIT ports -> {reuse}", self.name);
            return reuse;
        }

        self.pending.clear();
        for port in f_init {
            let Some(rx) = self.incoming.get(&port) else {
                continue;
            };
            match rx.recv() {
                Ok(message) => {
                    self.pending.insert(port, message);
                }
                Err(_) => {
                    debug!("{}: peer closed '{port}', no further reuse", self.name);
                    self.pending.clear();
                    return false;
                }
            }
        }
        self.reuses += 1;
        true
    }

    fn is_connected(&self, port: &str) -> bool {
        self.outgoing.contains_key(port) || self.incoming.contains_key(port)
    }

    fn get_setting(&self, name: &str) -> Option<SettingValue> {
        self.settings.get(name).cloned()
    }

    fn receive(&mut self, port: &str) -> Result<Message, CouplingError> {
        self.check_declared(port)?;
        if let Some(message) = self.pending.remove(port) {
            return Ok(message);
        }
        let rx = self
            .incoming
            .get(port)
            .ok_or_else(|| CouplingError::PortNotConnected {
                port: port.to_string(),
            })?;
        let message = rx.recv().map_err(|_| CouplingError::PeerDisconnected {
            port: port.to_string(),
        })?;
        trace!("{}: received on '{port}' at t={}", self.name, message.timestamp);
        Ok(message)
    }

    fn send(&mut self, port: &str, message: Message) -> Result<(), CouplingError> {
        self.check_declared(port)?;
        let Some(tx) = self.outgoing.get(port) else {
            trace!("{}: dropping message on unconnected '{port}'", self.name);
            return Ok(());
        };
        trace!("{}: sending on '{port}' at t={}", self.name, message.timestamp);
        tx.send(message).map_err(|_| CouplingError::PeerDisconnected {
            port: port.to_string(),
        })
    }
}
