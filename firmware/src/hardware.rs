//! ボード初期化と周辺機器アダプタ
//!
//! 周辺機器を制御コアのトレイトに接続します。

use dfoc_node::foc::duty_to_compare;
use dfoc_node::hal::{adc_counts_to_volts, AdcChannel, AngleSource, DutyCycleSink, Phase, VoltageSource};
use embassy_stm32::{
    adc::{Adc, AnyAdcChannel},
    bind_interrupts, peripherals,
    timer::{complementary_pwm::ComplementaryPwm, Channel},
    usart, Config,
};
use embedded_hal::i2c::I2c;

bind_interrupts!(pub struct Irqs {
    USART1 => usart::InterruptHandler<peripherals::USART1>;
    USART2 => usart::InterruptHandler<peripherals::USART2>;
});

/// クロック設定: HSI → PLL (÷4 × 85 ÷ 2) = 170 MHz
pub fn create_clock_config() -> Config {
    let mut config = Config::default();
    {
        use embassy_stm32::rcc::mux::{Adcsel, ClockMux};
        use embassy_stm32::rcc::{Pll, PllMul, PllPreDiv, PllRDiv, PllSource, Sysclk};

        config.rcc.hsi = true;
        config.rcc.pll = Some(Pll {
            source: PllSource::HSI,
            prediv: PllPreDiv::DIV4,
            mul: PllMul::MUL85,
            divp: None,
            divq: None,
            divr: Some(PllRDiv::DIV2),
        });
        config.rcc.sys = Sysclk::PLL1_R;

        let mut clock_mux = ClockMux::default();
        clock_mux.adc12sel = Adcsel::SYS;
        config.rcc.mux = clock_mux;
    }
    config
}

/// TIM1 相補出力（CH1..CH3 = A..C相）
pub struct PwmDutySink {
    pwm: ComplementaryPwm<'static, peripherals::TIM1>,
    max_duty: u16,
}

impl PwmDutySink {
    pub fn new(mut pwm: ComplementaryPwm<'static, peripherals::TIM1>) -> Self {
        let max_duty = pwm.get_max_duty();
        for ch in [Channel::Ch1, Channel::Ch2, Channel::Ch3] {
            pwm.set_duty(ch, 0);
            pwm.enable(ch);
        }
        Self { pwm, max_duty }
    }
}

impl DutyCycleSink for PwmDutySink {
    fn write_duty_cycle(&mut self, phase: Phase, duty: f32) {
        let ch = match phase {
            Phase::A => Channel::Ch1,
            Phase::B => Channel::Ch2,
            Phase::C => Channel::Ch3,
        };
        self.pwm.set_duty(ch, duty_to_compare(duty, self.max_duty));
    }
}

/// シャントアンプのADC1入力（C相は未配線）
pub struct AdcVoltageSource {
    adc: Adc<'static, peripherals::ADC1>,
    phase_a: AnyAdcChannel<peripherals::ADC1>,
    phase_b: AnyAdcChannel<peripherals::ADC1>,
}

impl AdcVoltageSource {
    pub fn new(
        adc: Adc<'static, peripherals::ADC1>,
        phase_a: AnyAdcChannel<peripherals::ADC1>,
        phase_b: AnyAdcChannel<peripherals::ADC1>,
    ) -> Self {
        Self {
            adc,
            phase_a,
            phase_b,
        }
    }
}

impl VoltageSource for AdcVoltageSource {
    fn read_voltage(&mut self, channel: AdcChannel) -> f32 {
        let counts = match channel {
            AdcChannel::PhaseA => self.adc.blocking_read(&mut self.phase_a),
            AdcChannel::PhaseB => self.adc.blocking_read(&mut self.phase_b),
            AdcChannel::PhaseC => return 0.0,
        };
        adc_counts_to_volts(counts)
    }
}

/// AS5600 磁気エンコーダ (I2C)
pub struct As5600<I> {
    i2c: I,
    last_angle: f32,
    errors: u32,
}

impl<I: I2c> As5600<I> {
    const ADDRESS: u8 = 0x36;
    const RAW_ANGLE: u8 = 0x0C;
    const COUNTS_PER_TURN: f32 = 4096.0;

    pub fn new(i2c: I) -> Self {
        Self {
            i2c,
            last_angle: 0.0,
            errors: 0,
        }
    }

    fn read_raw(&mut self) -> Result<u16, I::Error> {
        let mut buf = [0u8; 2];
        self.i2c.write_read(Self::ADDRESS, &[Self::RAW_ANGLE], &mut buf)?;
        Ok(u16::from_be_bytes(buf) & 0x0FFF)
    }
}

impl<I: I2c> AngleSource for As5600<I> {
    /// バスエラー時は前回の正常値を返す
    fn read_angle(&mut self) -> f32 {
        match self.read_raw() {
            Ok(raw) => {
                self.last_angle = raw as f32 * core::f32::consts::TAU / Self::COUNTS_PER_TURN;
            }
            Err(_) => {
                self.errors = self.errors.wrapping_add(1);
                if self.errors.is_power_of_two() {
                    warn!("AS5600 read failed ({} total)", self.errors);
                }
            }
        }
        self.last_angle
    }
}
