//! 摇杆数值类型与量化工具

/// POV 帽子开关居中（未按下）时的哨兵值
pub const HAT_CENTERED: i16 = -1;

/// 单个摇杆的数值快照
///
/// 容量在创建时固定：轴默认 0.0，按钮默认未按下，POV 默认 [`HAT_CENTERED`]。
#[derive(Debug, Clone, PartialEq)]
pub struct Joystick {
    pub axes: Vec<f32>,
    pub hats: Vec<i16>,
    pub buttons: Vec<bool>,
}

impl Joystick {
    pub fn new(axes: usize, hats: usize, buttons: usize) -> Self {
        Self {
            axes: vec![0.0; axes],
            hats: vec![HAT_CENTERED; hats],
            buttons: vec![false; buttons],
        }
    }

    pub fn num_axes(&self) -> usize {
        self.axes.len()
    }

    pub fn num_hats(&self) -> usize {
        self.hats.len()
    }

    pub fn num_buttons(&self) -> usize {
        self.buttons.len()
    }

    /// 按钮位标志（按钮 i 对应 bit i，最多 16 个）
    pub fn button_flags(&self) -> u16 {
        self.buttons
            .iter()
            .take(16)
            .enumerate()
            .filter(|(_, pressed)| **pressed)
            .fold(0u16, |flags, (i, _)| flags | (1 << i))
    }
}

/// 轴值 [-1, 1] 量化为有符号字节（× 127）
pub fn axis_to_byte(value: f32) -> u8 {
    let clamped = if value.is_nan() {
        0.0
    } else {
        value.clamp(-1.0, 1.0)
    };
    ((clamped * 127.0).round() as i8) as u8
}

/// 有符号字节还原为轴值
pub fn byte_to_axis(byte: u8) -> f32 {
    ((byte as i8) as f32 / 127.0).clamp(-1.0, 1.0)
}

/// 按钮位标志展开为 `count` 个布尔值
pub fn flags_to_buttons(flags: u16, count: usize) -> Vec<bool> {
    (0..count).map(|i| i < 16 && flags & (1 << i) != 0).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_joystick_defaults() {
        let js = Joystick::new(6, 1, 10);
        assert_eq!(js.num_axes(), 6);
        assert_eq!(js.num_hats(), 1);
        assert_eq!(js.num_buttons(), 10);
        assert!(js.axes.iter().all(|a| *a == 0.0));
        assert_eq!(js.hats[0], HAT_CENTERED);
        assert!(js.buttons.iter().all(|b| !b));
    }

    #[test]
    fn test_axis_quantization() {
        assert_eq!(axis_to_byte(1.0), 127);
        assert_eq!(axis_to_byte(-1.0), (-127i8) as u8);
        assert_eq!(axis_to_byte(0.0), 0);
        assert_eq!(axis_to_byte(5.0), 127);
        assert_eq!(axis_to_byte(f32::NAN), 0);
        assert!((byte_to_axis(axis_to_byte(0.5)) - 0.5).abs() < 1.0 / 127.0);
    }

    #[test]
    fn test_button_flags() {
        let mut js = Joystick::new(0, 0, 10);
        js.buttons[0] = true;
        js.buttons[9] = true;
        assert_eq!(js.button_flags(), 0b10_0000_0001);
        assert_eq!(flags_to_buttons(0b10_0000_0001, 10), js.buttons);
    }
}
