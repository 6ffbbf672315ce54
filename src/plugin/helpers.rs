//! Host-provided query helpers callable by loaded native modules.
//!
//! All helpers are read-only and bounds-checked. They return 1 on success
//! and 0 on failure, writing results through out-parameters, and must never
//! unwind across the C boundary.

use std::os::raw::{c_int, c_void};

use crate::model::{GridPos, VoxelModel};

unsafe fn model_ref<'a>(model: *const c_void) -> Option<&'a VoxelModel> {
    (model as *const VoxelModel).as_ref()
}

/// Query the model's bounding dimensions.
///
/// # Safety
/// `model` must be the handle passed in `NativeCtx::model`; out pointers
/// must be valid or null.
#[no_mangle]
pub unsafe extern "C" fn voxstack_model_get_size(
    model: *const c_void,
    out_x: *mut c_int,
    out_y: *mut c_int,
    out_z: *mut c_int,
) -> c_int {
    let Some(model) = model_ref(model) else {
        return 0;
    };
    let (x, y, z) = model.dims();
    if !out_x.is_null() {
        *out_x = x;
    }
    if !out_y.is_null() {
        *out_y = y;
    }
    if !out_z.is_null() {
        *out_z = z;
    }
    1
}

/// Query a voxel's color. Returns 0 for empty or out-of-bounds cells.
///
/// # Safety
/// `model` must be the handle passed in `NativeCtx::model`; `out_rgba`, if
/// non-null, must point to at least 4 writable bytes.
#[no_mangle]
pub unsafe extern "C" fn voxstack_model_get_voxel(
    model: *const c_void,
    x: c_int,
    y: c_int,
    z: c_int,
    out_rgba: *mut u8,
) -> c_int {
    let Some(model) = model_ref(model) else {
        return 0;
    };
    match model.color_at(GridPos::new(x, y, z)) {
        Some(color) => {
            if !out_rgba.is_null() {
                let rgba = color.to_array();
                std::ptr::copy_nonoverlapping(rgba.as_ptr(), out_rgba, 4);
            }
            1
        }
        None => 0,
    }
}

/// Whether the voxel exists and has at least one exposed face.
///
/// # Safety
/// `model` must be the handle passed in `NativeCtx::model`.
#[no_mangle]
pub unsafe extern "C" fn voxstack_model_is_visible(
    model: *const c_void,
    x: c_int,
    y: c_int,
    z: c_int,
) -> c_int {
    match model_ref(model) {
        Some(model) => model.is_visible(GridPos::new(x, y, z)) as c_int,
        None => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Rgba;

    #[test]
    fn test_helpers_are_bounds_checked() {
        let mut model = VoxelModel::new();
        model.insert(GridPos::new(0, 0, 0), Rgba::new(1, 2, 3, 4));
        let handle = &model as *const VoxelModel as *const c_void;

        let mut rgba = [0u8; 4];
        unsafe {
            assert_eq!(
                voxstack_model_get_voxel(handle, 0, 0, 0, rgba.as_mut_ptr()),
                1
            );
            assert_eq!(rgba, [1, 2, 3, 4]);
            assert_eq!(
                voxstack_model_get_voxel(handle, 9, 9, 9, rgba.as_mut_ptr()),
                0
            );
            assert_eq!(voxstack_model_is_visible(handle, 0, 0, 0), 1);
            assert_eq!(voxstack_model_is_visible(handle, -1, 0, 0), 0);

            let (mut x, mut y, mut z) = (0, 0, 0);
            assert_eq!(voxstack_model_get_size(handle, &mut x, &mut y, &mut z), 1);
            assert_eq!((x, y, z), (1, 1, 1));
        }
    }

    #[test]
    fn test_null_model_rejected() {
        unsafe {
            assert_eq!(
                voxstack_model_get_size(
                    std::ptr::null(),
                    std::ptr::null_mut(),
                    std::ptr::null_mut(),
                    std::ptr::null_mut()
                ),
                0
            );
            assert_eq!(voxstack_model_is_visible(std::ptr::null(), 0, 0, 0), 0);
        }
    }
}
