use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use brickwire_core::bits::{read_bits, BitBuffer};
use brickwire_core::config::ConfigBuilder;
use brickwire_core::logging;
use brickwire_devices::{EncoderMotor, MotorPort, RawSensor, SensorPort, Transport};
use brickwire_engine::{Controller, SharedListener};

/// Board simulator: each motor's encoder advances by its commanded speed
#[derive(Debug, Default)]
struct SimulatedBoard {
    encoders: Mutex<[[i64; 2]; 2]>,
    last: Mutex<Option<(u8, Vec<u8>)>>,
}

impl SimulatedBoard {
    fn respond(&self, address: u8, packet: &[u8]) -> io::Result<Vec<u8>> {
        let link = usize::from(address.saturating_sub(1)).min(1);
        match packet.first() {
            Some(3) => {
                let mut encoders = self.encoders.lock().unwrap();
                let mut bits = BitBuffer::new();
                bits.write(0, 8, 3);
                bits.write(8, 5, 16);
                bits.write(13, 5, 16);

                let mut offset = 18;
                for slot in 0..2 {
                    let field = read_bits(&packet[1..], 2 + slot * 10, 10)
                        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                    if field & 1 != 0 {
                        let speed = i64::from(field >> 2);
                        let speed = if field & 2 != 0 { -speed } else { speed };
                        encoders[link][slot] += speed;
                    }
                    let count = encoders[link][slot];
                    let word = ((count.unsigned_abs() as u32) << 1) | u32::from(count < 0);
                    bits.write(offset, 16, word & 0xFFFF);
                    offset += 16;
                }
                bits.write(offset, 10, 512);
                bits.write(offset + 10, 10, 256);
                Ok(bits.to_bytes(offset + 20))
            }
            Some(&tag) => Ok(vec![tag]),
            None => Err(io::Error::new(io::ErrorKind::InvalidInput, "empty packet")),
        }
    }
}

#[derive(Debug, Default)]
struct SimulatedTransport(Arc<SimulatedBoard>);

#[async_trait]
impl Transport for SimulatedTransport {
    async fn send(&self, address: u8, packet: &[u8]) -> io::Result<()> {
        *self.0.last.lock().unwrap() = Some((address, packet.to_vec()));
        Ok(())
    }

    async fn receive(&self, _timeout: Duration) -> io::Result<Vec<u8>> {
        let last = self.0.last.lock().unwrap().take();
        match last {
            Some((address, packet)) => self.0.respond(address, &packet),
            None => Err(io::Error::new(io::ErrorKind::TimedOut, "nothing sent")),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ConfigBuilder::new()
        .with_environment_prefix("BRICKWIRE")
        .build()?;

    // Initialize logging
    logging::init_from_config(&config.logging)?;

    let controller = Controller::new(Box::new(SimulatedTransport::default()), &config);

    let left = Arc::new(EncoderMotor::new());
    let right = Arc::new(EncoderMotor::new());
    controller.set_motor(MotorPort::A, Some(left.clone()))?;
    controller.set_motor(MotorPort::C, Some(right.clone()))?;

    let light = Arc::new(RawSensor::new());
    controller.set_sensor(SensorPort::S1, Some(light.clone()))?;

    controller.set_timeout(250_000).await?;

    let cycles = Arc::new(AtomicUsize::new(0));
    let seen = cycles.clone();
    let listener: SharedListener = Arc::new(move |_: &Controller| {
        seen.fetch_add(1, Ordering::SeqCst);
    });
    controller.add_update_listener(listener.clone());

    let polling = controller.setup_sensors().await?;
    println!("Polling armed: {}", polling);

    left.set_enabled(true);
    left.set_speed(40);
    right.set_enabled(true);
    right.set_speed(-25);

    tokio::time::sleep(Duration::from_secs(1)).await;

    println!(
        "After {} cycles: left encoder {}, right encoder {}, light {}",
        cycles.load(Ordering::SeqCst),
        left.encoder(),
        right.encoder(),
        light.value()
    );

    controller.set_update_delay(0);
    controller.remove_update_listener(&listener);
    println!("Polling stopped: {}", !controller.is_polling());

    Ok(())
}
