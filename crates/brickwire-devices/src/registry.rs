/*!
 * Port registry for Brickwire.
 *
 * This module maps the four sensor ports and four motor ports to the device
 * handles attached to them.
 */
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::device::{
    same_handle, ControllerLink, DeviceError, MotorPort, Result, SensorPort, SharedMotor,
    SharedSensor, PORTS, SLOTS_PER_LINK,
};
use crate::devices::RawSensor;

/// Fixed-size slot arrays for sensors and motors
#[derive(Debug, Default)]
pub struct PortRegistry {
    sensors: RwLock<[Option<SharedSensor>; PORTS]>,
    motors: RwLock<[Option<SharedMotor>; PORTS]>,
}

impl PortRegistry {
    /// Create a registry with every port empty
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a sensor to a port, or clear the port with `None`
    pub fn set_sensor(&self, port: SensorPort, sensor: Option<SharedSensor>) -> Result<()> {
        let mut sensors = self.sensors.write().unwrap_or_else(PoisonError::into_inner);

        if let Some(sensor) = &sensor {
            if let Some(other) = attached_elsewhere(&sensors[..], port.index(), sensor) {
                return Err(DeviceError::HandleInUse(
                    SensorPort::ALL[other].to_string(),
                ));
            }
        }

        sensors[port.index()] = sensor;
        debug!("Updated {}", port);
        Ok(())
    }

    /// The sensor attached to a port.
    ///
    /// A port that has never been given a sensor gets a [`RawSensor`], which is
    /// installed and returned, so this never comes back empty.
    pub fn sensor(&self, port: SensorPort) -> SharedSensor {
        if let Some(sensor) = self.sensor_slot(port) {
            return sensor;
        }

        let mut sensors = self.sensors.write().unwrap_or_else(PoisonError::into_inner);
        sensors[port.index()]
            .get_or_insert_with(|| {
                debug!("Uninitialized {}, installing raw sensor", port);
                Arc::new(RawSensor::new()) as SharedSensor
            })
            .clone()
    }

    /// The sensor attached to a port, without installing a default
    pub fn sensor_slot(&self, port: SensorPort) -> Option<SharedSensor> {
        self.sensors.read().unwrap_or_else(PoisonError::into_inner)[port.index()].clone()
    }

    /// Attach a motor to a port, or clear the port with `None`.
    ///
    /// The previous occupant loses its back-reference before the new motor is
    /// linked to `controller`.
    pub fn set_motor(
        &self,
        port: MotorPort,
        motor: Option<SharedMotor>,
        controller: &ControllerLink,
    ) -> Result<()> {
        let mut motors = self.motors.write().unwrap_or_else(PoisonError::into_inner);

        if let Some(motor) = &motor {
            if let Some(other) = attached_elsewhere(&motors[..], port.index(), motor) {
                return Err(DeviceError::HandleInUse(MotorPort::ALL[other].to_string()));
            }
        }

        if let Some(previous) = motors[port.index()].take() {
            previous.set_controller(None);
        }
        if let Some(motor) = &motor {
            motor.set_controller(Some(controller.clone()));
        }

        motors[port.index()] = motor;
        debug!("Updated {}", port);
        Ok(())
    }

    /// The motor attached to a port, if any
    pub fn motor(&self, port: MotorPort) -> Option<SharedMotor> {
        self.motors.read().unwrap_or_else(PoisonError::into_inner)[port.index()].clone()
    }

    /// Snapshot of the devices served by a link target.
    ///
    /// A request and the decoding of its response should share one snapshot,
    /// so a device attached in between never receives another device's field.
    pub fn link_slots(&self, link: usize) -> LinkSlots {
        let base = link * SLOTS_PER_LINK;
        let motors = self.motors.read().unwrap_or_else(PoisonError::into_inner);
        let sensors = self.sensors.read().unwrap_or_else(PoisonError::into_inner);
        LinkSlots {
            link,
            motors: [motors[base].clone(), motors[base + 1].clone()],
            sensors: [sensors[base].clone(), sensors[base + 1].clone()],
        }
    }
}

/// The devices attached to one link target at one instant
#[derive(Debug, Clone)]
pub struct LinkSlots {
    /// Index of the link target
    pub link: usize,
    /// Motor slots in wire order
    pub motors: [Option<SharedMotor>; SLOTS_PER_LINK],
    /// Sensor slots in wire order
    pub sensors: [Option<SharedSensor>; SLOTS_PER_LINK],
}

fn attached_elsewhere<T: ?Sized>(
    slots: &[Option<Arc<T>>],
    port: usize,
    handle: &Arc<T>,
) -> Option<usize> {
    slots.iter().enumerate().find_map(|(index, slot)| match slot {
        Some(existing) if index != port && same_handle(existing, handle) => Some(index),
        _ => None,
    })
}
