#![no_std]
#![no_main]

#[macro_use]
mod fmt;

mod hardware;
mod state;
mod tasks;

#[cfg(not(feature = "defmt"))]
use panic_halt as _;
#[cfg(feature = "defmt")]
use {defmt_rtt as _, panic_probe as _};

use dfoc_node::{CommandDecoder, HeartbeatTimer, MotorControl, NodeConfig};
use embassy_executor::Spawner;
use embassy_stm32::{
    adc::{Adc, AdcChannel, SampleTime},
    gpio::{Input, OutputType, Pull},
    i2c::{self, I2c},
    time::Hertz,
    timer::{
        complementary_pwm::{ComplementaryPwm, ComplementaryPwmPin},
        low_level::CountingMode,
        simple_pwm::PwmPin,
    },
    usart::{self, Uart},
};
use embassy_time::{Delay, Duration, Timer};

use hardware::{AdcVoltageSource, As5600, Irqs, PwmDutySink};
use tasks::{console_task, heartbeat_task, link_rx_task, link_tx_task, motor_control_task};

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let p = embassy_stm32::init(hardware::create_clock_config());

    info!("DFOC node • STM32G431VB @ 170MHz");

    let node = NodeConfig::default();
    if let Err(e) = node.validate() {
        error!("Invalid node configuration: {}", e);
        loop {
            Timer::after(Duration::from_secs(1)).await;
        }
    }
    info!(
        "Device id {}, supply {}V, {} pole pairs",
        node.device_id, node.supply_voltage, node.pole_pairs
    );

    // シャントアンプ: PA0 (ADC1_IN1), PA1 (ADC1_IN2)
    let mut adc1 = Adc::new(p.ADC1);
    adc1.set_sample_time(SampleTime::CYCLES24_5);
    let adc = AdcVoltageSource::new(adc1, p.PA0.degrade_adc(), p.PA1.degrade_adc());

    // TIM1 三相相補PWM
    let mut uvw_pwm = ComplementaryPwm::new(
        p.TIM1,
        Some(PwmPin::new(p.PE9, OutputType::PushPull)),
        Some(ComplementaryPwmPin::new(p.PE8, OutputType::PushPull)),
        Some(PwmPin::new(p.PE11, OutputType::PushPull)),
        Some(ComplementaryPwmPin::new(p.PE10, OutputType::PushPull)),
        Some(PwmPin::new(p.PE13, OutputType::PushPull)),
        Some(ComplementaryPwmPin::new(p.PE12, OutputType::PushPull)),
        None,
        None,
        Hertz(dfoc_node::config::pwm::DEFAULT_FREQUENCY_HZ),
        CountingMode::EdgeAlignedUp,
    );
    uvw_pwm.set_dead_time(dfoc_node::config::pwm::DEFAULT_DEAD_TIME);
    let pwm = PwmDutySink::new(uvw_pwm);

    // AS5600 (I2C1): PB8 = SCL, PB9 = SDA
    let mut i2c_config = i2c::Config::default();
    i2c_config.frequency = Hertz(400_000);
    let encoder = As5600::new(I2c::new_blocking(p.I2C1, p.PB8, p.PB9, i2c_config));

    let mut control = match MotorControl::new(node, adc, pwm, encoder) {
        Ok(control) => control,
        Err(e) => {
            error!("Motor control init failed: {}", e);
            loop {
                Timer::after(Duration::from_secs(1)).await;
            }
        }
    };

    // 完了するまでモーターと目標値に触れない
    info!("Calibrating...");
    let result = control.calibrate(&mut Delay);
    info!(
        "Calibration done: zero electric angle {} rad, direction {}",
        result.zero_electric_angle, result.direction
    );

    spawner.spawn(motor_control_task(control)).unwrap();

    // BLEモジュール (USART1): PA9 = TX, PA10 = RX, PB5 = STATE
    let mut link_config = usart::Config::default();
    link_config.baudrate = 115_200;
    let link = Uart::new(
        p.USART1, p.PA10, p.PA9, Irqs, p.DMA1_CH1, p.DMA1_CH2, link_config,
    )
    .unwrap();
    let (link_tx, link_rx) = link.split();
    let state_pin = Input::new(p.PB5, Pull::Down);

    spawner
        .spawn(link_rx_task(link_rx, CommandDecoder::new(node.device_id)))
        .unwrap();
    spawner.spawn(link_tx_task(link_tx)).unwrap();
    spawner
        .spawn(heartbeat_task(
            state_pin,
            HeartbeatTimer::new(node.device_id, node.heartbeat_interval_ms),
        ))
        .unwrap();

    // コンソール (USART2): PB3 = TX, PB4 = RX
    let mut console_config = usart::Config::default();
    console_config.baudrate = 115_200;
    let console = Uart::new(
        p.USART2, p.PB4, p.PB3, Irqs, p.DMA1_CH3, p.DMA1_CH4, console_config,
    )
    .unwrap();
    spawner.spawn(console_task(console)).unwrap();

    info!("All tasks started");
}
