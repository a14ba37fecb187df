//! 结果输出 - 粒子状态 → 组件空间骨骼变换

use crate::skeleton::{BoneTransform, ForwardAxis};

use super::chain::Particle;
use super::integrator::estimate_parent_rotation;

/// 单根骨骼的输出（组件空间）
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoneTransformOutput {
    pub bone_index: usize,
    pub transform: BoneTransform,
}

/// 生成输出列表，按骨骼索引严格递增
///
/// - 每个粒子先以姿态变换为底
/// - 只有一个子粒子的父骨骼改用模拟朝向，并记为下一帧的 `prev_rotation`
/// - 非虚拟粒子的位置改为模拟位置
/// - 虚拟粒子与本帧不可用的骨骼不输出
pub fn compose_output(particles: &mut [Particle], forward_axis: ForwardAxis) -> Vec<BoneTransformOutput> {
    let mut transforms: Vec<BoneTransform> = particles
        .iter()
        .map(|p| BoneTransform::new(p.pose_location, p.pose_rotation, p.pose_scale))
        .collect();

    for i in 0..particles.len() {
        let Some(parent_index) = particles[i].parent else {
            continue;
        };
        let parent = &particles[parent_index];
        let particle = &particles[i];

        // 分叉处没有唯一方向，保持姿态朝向
        let rotation = if parent.children.len() <= 1
            && !parent.is_dummy()
            && parent.pose_valid
            && particle.pose_valid
        {
            estimate_parent_rotation(parent, particle, forward_axis)
        } else {
            None
        };
        if let Some(rotation) = rotation {
            transforms[parent_index].rotation = rotation;
            particles[parent_index].prev_rotation = rotation;
        }

        if !particles[i].is_dummy() {
            transforms[i].translation = particles[i].location;
        }
    }

    let mut output: Vec<BoneTransformOutput> = particles
        .iter()
        .zip(transforms)
        .filter(|(p, _)| p.pose_valid)
        .filter_map(|(p, transform)| {
            p.bone_index.map(|bone_index| BoneTransformOutput { bone_index, transform })
        })
        .collect();
    output.sort_by_key(|o| o.bone_index);
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Quat, Vec3};

    /// 0 → 1 → 2(虚拟)，外加 0 → 3 的分支可选
    fn chain(branch: bool) -> Vec<Particle> {
        let mut root = Particle::test_new(None, Vec3::ZERO);
        root.bone_index = Some(5);
        let mut mid = Particle::test_new(Some(0), Vec3::new(0.0, 10.0, 0.0));
        mid.bone_index = Some(2);
        mid.pose_location = Vec3::new(10.0, 0.0, 0.0);
        let mut dummy = Particle::test_new(Some(1), Vec3::new(0.0, 20.0, 0.0));
        dummy.bone_index = None;
        dummy.pose_location = Vec3::new(20.0, 0.0, 0.0);
        root.children.push(1);
        mid.children.push(2);
        let mut particles = vec![root, mid, dummy];
        if branch {
            let mut side = Particle::test_new(Some(0), Vec3::new(0.0, 0.0, 5.0));
            side.bone_index = Some(9);
            particles[0].children.push(3);
            particles.push(side);
        }
        particles
    }

    #[test]
    fn test_sorted_and_dummy_dropped() {
        let mut particles = chain(true);
        let output = compose_output(&mut particles, ForwardAxis::XPositive);
        let indices: Vec<_> = output.iter().map(|o| o.bone_index).collect();
        assert_eq!(indices, vec![2, 5, 9]);
    }

    #[test]
    fn test_single_child_parent_rotation() {
        let mut particles = chain(false);
        let output = compose_output(&mut particles, ForwardAxis::XPositive);

        let root = output.iter().find(|o| o.bone_index == 5).unwrap();
        // 姿态方向 +X，模拟方向 +Y
        assert!((root.transform.rotation * Vec3::X).abs_diff_eq(Vec3::Y, 1e-5));
        assert!(particles[0].prev_rotation.abs_diff_eq(root.transform.rotation, 1e-6));

        let mid = output.iter().find(|o| o.bone_index == 2).unwrap();
        assert_eq!(mid.transform.translation, Vec3::new(0.0, 10.0, 0.0));
        assert!((mid.transform.rotation * Vec3::X).abs_diff_eq(Vec3::Y, 1e-5));
    }

    #[test]
    fn test_branch_parent_keeps_pose_rotation() {
        let mut particles = chain(true);
        let output = compose_output(&mut particles, ForwardAxis::XPositive);
        let root = output.iter().find(|o| o.bone_index == 5).unwrap();
        assert_eq!(root.transform.rotation, Quat::IDENTITY);
    }

    #[test]
    fn test_stripped_bone_dropped() {
        let mut particles = chain(true);
        particles[3].pose_valid = false;
        let output = compose_output(&mut particles, ForwardAxis::XPositive);
        assert!(output.iter().all(|o| o.bone_index != 9));
    }
}
