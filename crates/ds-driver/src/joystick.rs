//! 摇杆注册表
//!
//! 固定容量的摇杆数值存储，索引即身份。所有写操作都做边界检查，
//! 越界时返回 `InvalidJoystickIndex` 且不修改任何状态。

use crate::error::DriverError;
use ds_protocol::{Joystick, JoystickLimits};

#[derive(Debug, Clone, Default)]
pub struct JoystickRegistry {
    joysticks: Vec<Joystick>,
}

impl JoystickRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.joysticks.len()
    }

    pub fn joysticks(&self) -> &[Joystick] {
        &self.joysticks
    }

    pub fn get(&self, index: usize) -> Option<&Joystick> {
        self.joysticks.get(index)
    }

    pub fn clear(&mut self) {
        self.joysticks.clear();
    }

    /// 追加摇杆，返回分配的索引
    ///
    /// 轴/帽子/按钮数量按协议上限截断；摇杆数量已达上限时返回 `None`。
    pub fn add(
        &mut self,
        axes: usize,
        hats: usize,
        buttons: usize,
        limits: &JoystickLimits,
    ) -> Option<usize> {
        if self.joysticks.len() >= limits.max_joysticks {
            return None;
        }
        self.joysticks.push(Joystick::new(
            axes.min(limits.max_axes),
            hats.min(limits.max_hats),
            buttons.min(limits.max_buttons),
        ));
        Some(self.joysticks.len() - 1)
    }

    /// 设置轴值（限制在 [-1, 1]）
    pub fn set_axis(&mut self, index: usize, axis: usize, value: f32) -> Result<(), DriverError> {
        let slot = self.slot_mut(index, "axis", axis, |js| js.num_axes())?;
        slot.axes[axis] = if value.is_nan() {
            0.0
        } else {
            value.clamp(-1.0, 1.0)
        };
        Ok(())
    }

    pub fn set_button(
        &mut self,
        index: usize,
        button: usize,
        pressed: bool,
    ) -> Result<(), DriverError> {
        let slot = self.slot_mut(index, "button", button, |js| js.num_buttons())?;
        slot.buttons[button] = pressed;
        Ok(())
    }

    /// 设置 POV 角度（-1 表示居中）
    pub fn set_hat(&mut self, index: usize, hat: usize, angle: i16) -> Result<(), DriverError> {
        let slot = self.slot_mut(index, "hat", hat, |js| js.num_hats())?;
        slot.hats[hat] = angle;
        Ok(())
    }

    /// 协议切换前检查：当前摇杆能否被新协议容纳
    pub fn fits(&self, limits: &JoystickLimits) -> bool {
        self.joysticks.len() <= limits.max_joysticks
    }

    /// 按新协议上限截断每个摇杆的输入数量，返回被截断的摇杆数
    ///
    /// 截断不可逆：切回容量更大的协议后需要重新添加摇杆。
    pub fn clamp_to(&mut self, limits: &JoystickLimits) -> usize {
        let mut truncated = 0;
        for js in &mut self.joysticks {
            let before = (js.num_axes(), js.num_hats(), js.num_buttons());
            js.axes.truncate(limits.max_axes);
            js.hats.truncate(limits.max_hats);
            js.buttons.truncate(limits.max_buttons);
            if before != (js.num_axes(), js.num_hats(), js.num_buttons()) {
                truncated += 1;
            }
        }
        truncated
    }

    fn slot_mut(
        &mut self,
        index: usize,
        kind: &'static str,
        sub: usize,
        len: impl Fn(&Joystick) -> usize,
    ) -> Result<&mut Joystick, DriverError> {
        let count = self.joysticks.len();
        let Some(js) = self.joysticks.get_mut(index) else {
            return Err(DriverError::InvalidJoystickIndex {
                joystick: index,
                kind: "joystick",
                index,
                count,
            });
        };
        let sub_count = len(js);
        if sub >= sub_count {
            return Err(DriverError::InvalidJoystickIndex {
                joystick: index,
                kind,
                index: sub,
                count: sub_count,
            });
        }
        Ok(js)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ds_protocol::{Frc2015, Protocol};
    use proptest::prelude::*;

    fn limits() -> JoystickLimits {
        Frc2015.limits()
    }

    #[test]
    fn test_add_and_set_axis() {
        let mut registry = JoystickRegistry::new();
        assert_eq!(registry.add(6, 1, 10, &limits()), Some(0));
        registry.set_axis(0, 0, 0.5).unwrap();
        assert_eq!(registry.get(0).unwrap().axes[0], 0.5);
    }

    #[test]
    fn test_defaults() {
        let mut registry = JoystickRegistry::new();
        registry.add(2, 1, 3, &limits());
        let js = registry.get(0).unwrap();
        assert_eq!(js.axes, vec![0.0, 0.0]);
        assert_eq!(js.hats, vec![-1]);
        assert_eq!(js.buttons, vec![false; 3]);
    }

    #[test]
    fn test_out_of_range_button_is_rejected() {
        let mut registry = JoystickRegistry::new();
        registry.add(6, 1, 10, &limits());
        registry.add(6, 1, 10, &limits());
        let before = registry.clone();

        let err = registry.set_button(2, 0, true).unwrap_err();
        assert!(matches!(
            err,
            DriverError::InvalidJoystickIndex { joystick: 2, count: 2, .. }
        ));
        assert_eq!(registry.joysticks(), before.joysticks());
    }

    #[test]
    fn test_sub_index_out_of_range() {
        let mut registry = JoystickRegistry::new();
        registry.add(2, 0, 2, &limits());
        assert!(registry.set_axis(0, 2, 1.0).is_err());
        assert!(registry.set_hat(0, 0, 90).is_err());
        assert!(registry.set_button(0, 5, true).is_err());
    }

    #[test]
    fn test_add_clamps_to_limits() {
        let mut registry = JoystickRegistry::new();
        registry.add(12, 4, 32, &limits());
        let js = registry.get(0).unwrap();
        assert_eq!(js.num_axes(), 6);
        assert_eq!(js.num_hats(), 1);
        assert_eq!(js.num_buttons(), 10);
    }

    #[test]
    fn test_clamp_to_reports_truncation() {
        let mut registry = JoystickRegistry::new();
        registry.add(6, 1, 10, &limits());
        registry.add(2, 0, 4, &limits());

        let frc2014 = ds_protocol::Frc2014.limits();
        assert_eq!(registry.clamp_to(&frc2014), 1);
        assert_eq!(registry.get(0).unwrap().num_hats(), 0);
        assert_eq!(registry.get(1).unwrap().num_buttons(), 4);

        // 已符合上限时不再截断
        assert_eq!(registry.clamp_to(&frc2014), 0);
        assert_eq!(registry.clamp_to(&limits()), 0);
        assert_eq!(registry.get(0).unwrap().num_hats(), 0);
    }

    #[test]
    fn test_joystick_limit() {
        let mut registry = JoystickRegistry::new();
        for i in 0..6 {
            assert_eq!(registry.add(1, 0, 1, &limits()), Some(i));
        }
        assert_eq!(registry.add(1, 0, 1, &limits()), None);
        assert_eq!(registry.count(), 6);
    }

    #[test]
    fn test_axis_clamped() {
        let mut registry = JoystickRegistry::new();
        registry.add(1, 0, 0, &limits());
        registry.set_axis(0, 0, 3.0).unwrap();
        assert_eq!(registry.get(0).unwrap().axes[0], 1.0);
    }

    proptest! {
        /// 越界索引不修改任何状态
        #[test]
        fn out_of_bounds_never_mutates(
            count in 0usize..4,
            index in 0usize..16,
            sub in 0usize..16,
            value in -2.0f32..2.0,
        ) {
            let mut registry = JoystickRegistry::new();
            for _ in 0..count {
                registry.add(2, 1, 4, &limits());
            }
            let before = registry.clone();

            let axis = registry.set_axis(index, sub, value);
            let button = registry.set_button(index, sub, true);
            let hat = registry.set_hat(index, sub, 90);

            if index >= count {
                prop_assert!(axis.is_err() && button.is_err() && hat.is_err());
                prop_assert_eq!(registry.joysticks(), before.joysticks());
            }
            if sub >= 4 {
                prop_assert!(button.is_err());
            }
        }
    }
}
